//! src/transforms/vision/mod.rs
//!
//! Vision transforms over `ndarray` pixel arrays in `(height, width, channel)` layout.
//!
//! ```text
//! transforms/vision/
//! ├── io.rs            → Decode a file into Array3<u8>
//! ├── photometric.rs   → Mean subtraction (u8 → f32)
//! ├── geometric.rs     → Centered or random crop
//! └── augmentation.rs  → Random horizontal mirror
//! ```

pub mod augmentation;
pub mod geometric;
pub mod io;
pub mod photometric;

pub use augmentation::RandomHorizontalFlip;
pub use geometric::{Crop, CropMode};
pub use io::{rgb_to_array, LoadImage, LoadSample};
pub use photometric::SubtractMean;
