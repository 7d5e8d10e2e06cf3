//! Incremental edits to the live configuration.

use crate::gateway::{write_field, FieldError};
use crate::model::{ConfigSnapshot, NotificationChannel, PromptTemplate, Section};

use serde::Deserialize;
use serde_json::Value;

/// A single user edit.
///
/// Updates keep the id of the entry they replace, so a server-assigned id is
/// never lost or forged by an edit.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SettingsEdit {
    /// Set a declared config key. The value is decoded through the key's type.
    Field { key: String, value: Value },
    AddPrompt { prompt: PromptTemplate },
    UpdatePrompt { index: usize, prompt: PromptTemplate },
    RemovePrompt { index: usize },
    AddChannel { channel: NotificationChannel },
    UpdateChannel { index: usize, channel: NotificationChannel },
    RemoveChannel { index: usize },
}

impl SettingsEdit {
    /// Apply to `snapshot`, returning the touched section.
    ///
    /// On error the snapshot is left as it was.
    pub fn apply(self, snapshot: &mut ConfigSnapshot) -> Result<Section, FieldError> {
        match self {
            SettingsEdit::Field { key, value } => {
                let mut draft = snapshot.clone();
                let section = write_field(&mut draft, &key, &value)?;
                *snapshot = draft;
                Ok(section)
            }
            SettingsEdit::AddPrompt { mut prompt } => {
                let prompts = &mut snapshot.ai.prompts;
                prompt.id = Default::default();
                prompts.push(prompt);
                Ok(Section::Prompts)
            }
            SettingsEdit::UpdatePrompt { index, mut prompt } => {
                let prompts = &mut snapshot.ai.prompts;
                let slot = prompts.get_mut(index).ok_or(FieldError::NoSuchEntry { index })?;
                prompt.id = slot.id;
                *slot = prompt;
                Ok(Section::Prompts)
            }
            SettingsEdit::RemovePrompt { index } => {
                let prompts = &mut snapshot.ai.prompts;
                if index >= prompts.len() {
                    return Err(FieldError::NoSuchEntry { index });
                }
                prompts.remove(index);
                Ok(Section::Prompts)
            }
            SettingsEdit::AddChannel { mut channel } => {
                let channels = &mut snapshot.integration.channels;
                channel.id = Default::default();
                channels.push(channel);
                Ok(Section::Channels)
            }
            SettingsEdit::UpdateChannel { index, mut channel } => {
                let channels = &mut snapshot.integration.channels;
                let slot = channels.get_mut(index).ok_or(FieldError::NoSuchEntry { index })?;
                channel.id = slot.id;
                *slot = channel;
                Ok(Section::Channels)
            }
            SettingsEdit::RemoveChannel { index } => {
                let channels = &mut snapshot.integration.channels;
                if index >= channels.len() {
                    return Err(FieldError::NoSuchEntry { index });
                }
                channels.remove(index);
                Ok(Section::Channels)
            }
        }
    }
}
