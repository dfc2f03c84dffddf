//! # QuizBot
//!
//! Core of a multi-channel chat trivia bot. Each channel runs at most one
//! quiz session: questions come from a text-generation provider (with a local
//! fallback pool), answers typed in chat are matched leniently, and points
//! reward speed and streaks. Chat delivery, durable statistics and question
//! generation are collaborators behind traits, see [`transport`],
//! [`persistence`] and [`supplier`].
//!
//! [`registry::Registry`] is the entry point: feed it every inbound message
//! through [`registry::Registry::on_message`].

#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::similar_names)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::ignored_unit_patterns)]
#![allow(clippy::struct_field_names)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::wildcard_imports)]

use derive_where::derive_where;
use itertools::Itertools;
use serde::Serialize;

pub mod announce;
pub mod answer;
pub mod commands;
pub mod config;
pub mod constants;
pub mod error;
pub mod ids;
pub mod persistence;
pub mod question;
pub mod registry;
pub mod scoring;
pub mod session;
pub mod supplier;
pub mod transport;

#[cfg(test)]
mod testing;

pub use config::QuizConfig;
pub use error::QuizError;
pub use ids::{ChannelId, PlayerId, SessionId};
pub use registry::Registry;
pub use session::{AnswerOutcome, Phase};

/// The first few items of a list together with the length of the whole list
///
/// Final results print only the best players but still say how many took
/// part.
#[derive(Debug, Clone, Serialize)]
#[derive_where(Default)]
pub struct TruncatedVec<T> {
    exact_count: usize,
    items: Vec<T>,
}

impl<T> TruncatedVec<T> {
    /// Keeps up to `limit` items of `list`, remembering `exact_count` as the full length
    pub fn new<I: Iterator<Item = T>>(list: I, limit: usize, exact_count: usize) -> Self {
        let items = list.take(limit).collect_vec();
        Self { exact_count, items }
    }

    /// Length of the whole list
    pub fn exact_count(&self) -> usize {
        self.exact_count
    }

    /// The kept items
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// How many items were left out
    pub fn hidden(&self) -> usize {
        self.exact_count.saturating_sub(self.items.len())
    }
}
