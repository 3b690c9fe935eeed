//! Single-pass k-means centroid update.
//!
//! One dispatch computes the new centroid of one cluster over an entire image
//! without a global barrier: every group of 256 workers reduces its pixels
//! with a masked accumulation and a group-local scan, learns the sum of all
//! groups before it through a decoupled look-back over per-group status
//! flags, and the last lane of the last group turns the grand total into the
//! new centroid and a convergence bit.
//!
//! This crate is the executable model of that kernel. Groups are
//! [`GroupStore`]-sharing state machines run either on one OS thread each or
//! under a deterministic interleaving ([`Schedule`]), next to a sequential
//! [`reference`] model to check them against. The WGSL rendition and its wgpu
//! host live in `centroid-scan-wgpu` and share the buffer [`layout`].
//!
//! ```
//! use centroid_scan::{KMeansState, PixelGrid, RunParams, Schedule};
//! use glam::Vec4;
//!
//! let pixels = PixelGrid::solid(2, 2, Vec4::new(1.0, 0.0, 0.0, 1.0));
//! let mut state = KMeansState::new(&[Vec4::new(0.0, 0.0, 0.0, 1.0)])?;
//! let report = state.dispatch(&pixels, &[0; 4], 0, &RunParams::default(), &Schedule::Threaded)?;
//! assert_eq!(report.total, Some(Vec4::new(4.0, 0.0, 0.0, 4.0)));
//! assert_eq!(state.centroids()[0], Vec4::new(1.0, 0.0, 0.0, 1.0));
//! # Ok::<(), centroid_scan::DispatchError>(())
//! ```

// BEGIN - Embark standard lints v0.4
// do not change or add/remove here, but one can add exceptions after this section
// for more info see: <https://github.com/EmbarkStudios/rust-ecosystem/issues/59>
#![deny(unsafe_code)]
#![warn(
    clippy::all,
    clippy::await_holding_lock,
    clippy::char_lit_as_u8,
    clippy::checked_conversions,
    clippy::dbg_macro,
    clippy::debug_assert_with_mut_call,
    clippy::doc_markdown,
    clippy::empty_enum,
    clippy::enum_glob_use,
    clippy::exit,
    clippy::expl_impl_clone_on_copy,
    clippy::explicit_deref_methods,
    clippy::explicit_into_iter_loop,
    clippy::fallible_impl_from,
    clippy::filter_map_next,
    clippy::float_cmp_const,
    clippy::fn_params_excessive_bools,
    clippy::if_let_mutex,
    clippy::implicit_clone,
    clippy::imprecise_flops,
    clippy::inefficient_to_string,
    clippy::invalid_upcast_comparisons,
    clippy::large_types_passed_by_value,
    clippy::let_unit_value,
    clippy::linkedlist,
    clippy::lossy_float_literal,
    clippy::macro_use_imports,
    clippy::manual_ok_or,
    clippy::map_err_ignore,
    clippy::map_flatten,
    clippy::map_unwrap_or,
    clippy::match_same_arms,
    clippy::match_wildcard_for_single_variants,
    clippy::mem_forget,
    clippy::mut_mut,
    clippy::mutex_integer,
    clippy::needless_borrow,
    clippy::needless_continue,
    clippy::option_option,
    clippy::path_buf_push_overwrite,
    clippy::ptr_as_ptr,
    clippy::ref_option_ref,
    clippy::rest_pat_in_fully_bound_structs,
    clippy::same_functions_in_if_condition,
    clippy::semicolon_if_nothing_returned,
    clippy::string_add_assign,
    clippy::string_add,
    clippy::string_lit_as_bytes,
    clippy::string_to_string,
    clippy::todo,
    clippy::trait_duplication_in_bounds,
    clippy::unimplemented,
    clippy::unnested_or_patterns,
    clippy::unused_self,
    clippy::useless_transmute,
    clippy::verbose_file_reads,
    clippy::zero_sized_map_values,
    future_incompatible,
    nonstandard_style,
    rust_2018_idioms
)]
// END - Embark standard lints v0.4
// crate-specific exceptions:
// #![allow()]

mod accumulate;
mod config;
mod convergence;
mod dispatch;
mod error;
mod finalize;
mod image;
mod kernel;
pub mod layout;
mod lookback;
pub mod reference;
mod scan;
mod slots;
mod state;
mod store;

pub use accumulate::masked_accumulate;
pub use config::{EmptyClusterPolicy, MAX_WORKGROUP_SIZE, RunParams};
pub use convergence::{CentroidTable, ConvergenceVector};
pub use dispatch::{DispatchReport, Schedule};
pub use error::DispatchError;
pub use finalize::{Finalization, centroid_from_total, centroid_shift};
pub use image::PixelGrid;
pub use lookback::{LookBack, LookBackPoll};
pub use scan::inclusive_scan;
pub use slots::AtomicVec4;
pub use state::KMeansState;
pub use store::GroupStore;
