mod classifier;
mod signal;
mod window;

pub use classifier::{BeatClassifier, ClassifierConfig};
pub use signal::{band_energy, FrequencySource, StaticSnapshot};
pub use window::RollingWindow;
