//! Compatibility layer for rayon/sequential execution.
//!
//! With the `parallel` feature this re-exports rayon's parallel iterators. Without it a
//! sequential stand-in provides `into_par_iter()` so the analysis pipeline keeps a single
//! code path.
#[cfg(feature = "parallel")]
pub use rayon::prelude::*;

#[cfg(not(feature = "parallel"))]
mod sequential {
    /// Sequential stand-in for `rayon::prelude::IntoParallelIterator`.
    ///
    /// `into_par_iter()` forwards to `into_iter()`, so the remaining chain
    /// (`.map()`, `.collect()`, ...) resolves to the standard `Iterator` methods.
    pub trait IntoParallelIterator {
        type Iter;
        type Item;
        fn into_par_iter(self) -> Self::Iter;
    }

    impl<I: IntoIterator> IntoParallelIterator for I {
        type Iter = I::IntoIter;
        type Item = I::Item;
        fn into_par_iter(self) -> Self::Iter {
            self.into_iter()
        }
    }
}

#[cfg(not(feature = "parallel"))]
pub use sequential::*;
