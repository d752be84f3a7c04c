use tally_common::CodecError;

use crate::decoding::settings::SettingsKey;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error(transparent)]
    MalformedLogData(#[from] CodecError),
    #[error("No accounting settings declared for {0}")]
    UnknownSettingsKey(SettingsKey),
    #[error("Accounting settings for {key} declared twice (second by decoder '{decoder}')")]
    DuplicateSettingsKey { key: SettingsKey, decoder: String },
    #[error("Accounting settings for {0} declare a take of zero")]
    InvalidTake(SettingsKey),
    #[error("Duplicate decoder name '{0}'. Decoder names must be unique")]
    DuplicateDecoder(String),
}

impl DecodeError {
    /// Malformed input only invalidates the log it came from.
    pub fn is_malformed(&self) -> bool {
        matches!(self, DecodeError::MalformedLogData(_))
    }
}
