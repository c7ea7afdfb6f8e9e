//! # webthing-domain
//!
//! Pure model of the Web Thing protocol engine.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Classify wire values and validate them against JSON-schema-like
//!   **Validators**
//! - Define **Properties** (named, typed slots bound to host state)
//! - Define **Actions** (invocable operations and their lifecycle)
//! - Define **Events** (named occurrences with validated data)
//! - Shape **Messages** exchanged with subscribers and the Thing description
//!
//! ## Dependency rule
//! This crate has **no internal dependencies** and performs no IO.
//! Concurrency, scheduling and delivery live in the `app` crate.

pub mod error;
pub mod id;
pub mod time;
pub mod value;

pub mod action;
pub mod description;
pub mod event;
pub mod message;
pub mod metadata;
pub mod options;
pub mod property;
pub mod validator;
