//! Succinct bit sequences: the foundation every other structure is built on.
//!
//! | Structure | Space | Operations |
//! |-----------|-------|------------|
//! | [`Bitmap`] | n + ~3% bits | O(1) rank, near-O(1) select |
//!
//! ```
//! use hdtdb::succinct::Bitmap;
//!
//! let bits: Vec<bool> = (0..1000).map(|i| i % 5 == 0).collect();
//! let bm = Bitmap::from_bools(&bits);
//! assert_eq!(bm.rank1(500), 100);
//! assert_eq!(bm.select1(49), Some(245));
//! ```

mod bitmap;

pub use bitmap::{Bitmap, BitmapBuilder};
