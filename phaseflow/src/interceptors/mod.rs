//! Reusable wrapping interceptor chains (middleware building block).

mod chain;

pub use chain::{Interceptable0, Interceptable1, Interceptable2};
