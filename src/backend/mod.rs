//! Thread-based scheduler backends.
//!
//! | Backend | Time scheduling | Restart |
//! |---|---|---|
//! | [`ImmediateScheduler`] | no | never disposed |
//! | [`ParallelScheduler`] | yes | yes |
//! | [`ElasticScheduler`] | yes | yes |
//! | [`ExecutorScheduler`] | no | no |

pub mod elastic;
pub mod executor;
pub mod immediate;
pub mod parallel;

pub use elastic::ElasticScheduler;
pub use executor::{Executor, ExecutorScheduler};
pub use immediate::ImmediateScheduler;
pub use parallel::ParallelScheduler;
