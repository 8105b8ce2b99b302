//! Remote services used by the narration pipeline: Anthropic for scripts
//! and Google Translate for speech.

pub mod anthropic;
pub mod google_tts;

pub use anthropic::{AnthropicClient, AnthropicConnector};
pub use google_tts::{split_for_speech, GoogleTts};
