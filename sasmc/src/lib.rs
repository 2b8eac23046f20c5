#![warn(clippy::all, clippy::cargo, clippy::nursery, clippy::pedantic)]
#![warn(missing_docs)]

//! `sasmc` reconstructs a population of scatterers whose aggregate
//! form-factor intensity matches a measured one-dimensional small-angle
//! scattering curve I(Q).
//!
//! A finite ensemble of independent contributions is perturbed one at a time;
//! a move is accepted when it lowers the reduced chi-squared against the
//! data, with the scaling factor and flat background re-fitted in closed form
//! at every evaluation. Because the inverse problem is ill-posed, the
//! procedure is repeated with independent random seeds and the resulting
//! ensembles are histogrammed and averaged to expose the distribution of
//! solutions and its uncertainty.

pub mod analysis;
pub mod config;
mod convert;
pub mod data;
pub mod error;
pub mod hist;
pub mod kernel;
pub mod model;
pub mod opt;
pub mod optimizer;
pub mod osb;
pub mod runner;
pub mod sphere;
pub mod store;
