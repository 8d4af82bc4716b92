//! The real-time mixer core: channel state machine, linear envelopes, the
//! mixing callback, the dying-list reaper, and the control API surface that
//! ties them together behind the audio lock and the name lock.

pub mod channel;
pub mod control;
pub mod dying_list;
pub mod interpolator;
pub mod mixer;

pub use channel::{Channel, StreamSlot};
pub use control::PlayRequest;
pub use dying_list::DyingList;
pub use interpolator::Interpolator;
pub use mixer::{mix_into, MixScratch};
