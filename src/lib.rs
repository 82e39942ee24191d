//! # Intertext
//!
//! Client-side core of an intertextual search tool for classical texts.
//!
//! A comparison request (source text, target text, language, match
//! settings) goes to the search server, which streams progress events and
//! finally the ranked passage matches. This crate consumes that stream as a
//! cancellable session and decides which words of each matched passage are
//! highlighted.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌─────────────┐   ┌──────────────┐
//! │ Transport │──▶│   Stream    │──▶│   Session    │──▶ observers
//! │  (HTTP)   │   │  decoder    │   │ reduce + run │
//! └───────────┘   └─────────────┘   └──────┬───────┘
//!                                          │ results
//!                                          ▼
//!                 ┌─────────────┐   ┌──────────────┐
//!                 │ Normalizer  │◀──│  Highlight   │──▶ rendered passages
//!                 │ la/grc/en   │   │  resolver    │
//!                 └─────────────┘   └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! itx search --source vergil.aeneid.tess --target lucan.bellum_civile.tess
//! itx search --source homer.iliad.tess --target apollonius.argonautica.tess \
//!     --language greek --match-type sound --set stoplist=10
//! itx normalize Virumque --language latin
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Requests, passages, match evidence |
//! | [`normalize`] | Per-language orthographic normalization |
//! | [`stream`] | `data:` line decoding of the event stream |
//! | [`transport`] | Transport traits and the HTTP implementation |
//! | [`session`] | Session state machine and runner |
//! | [`progress`] | Session observers for stderr progress |
//! | [`highlight`] | Highlight resolution |
//! | [`search`] | CLI search command |
//! | [`logging`] | Tracing subscriber setup |

pub mod config;
pub mod highlight;
pub mod logging;
pub mod models;
pub mod normalize;
pub mod progress;
pub mod search;
pub mod session;
pub mod stream;
pub mod transport;
