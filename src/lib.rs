//! ID3 decision trees on categorical data.
//!
//! The attributes and the labels are small non-negative integer codes. A [`Dataset`] owns the
//! rows once, every node of the training works on a [`DatasetView`] (a permutation of row
//! indices), and splits are found with counting sorts over the bounded value domains.

extern crate either;
extern crate itertools;
extern crate ordered_float;
extern crate rayon;
#[macro_use]
extern crate serde_derive;

mod attributes;
mod data;
mod error;
mod math;
mod matrix;
mod tree;
mod view;

pub use crate::attributes::*;
pub use crate::data::*;
pub use crate::error::*;
pub use crate::math::*;
pub use crate::matrix::*;
pub use crate::tree::*;
pub use crate::view::*;

pub(crate) static DEFAULT_MIN_SAMPLES_SPLIT: usize = 2;
pub(crate) static DEFAULT_MAX_COUNTING_SORT_VALUE: u32 = 65_535;
