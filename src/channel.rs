//! Channel identities
//!
//! The four logical links whose fading is modelled independently.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::FadingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelType {
    ForwardFeeder,
    ForwardUser,
    ReturnUser,
    ReturnFeeder,
}

impl ChannelType {
    pub const ALL: [ChannelType; 4] = [
        ChannelType::ForwardFeeder,
        ChannelType::ForwardUser,
        ChannelType::ReturnUser,
        ChannelType::ReturnFeeder,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ChannelType::ForwardFeeder => "FORWARD_FEEDER",
            ChannelType::ForwardUser => "FORWARD_USER",
            ChannelType::ReturnUser => "RETURN_USER",
            ChannelType::ReturnFeeder => "RETURN_FEEDER",
        }
    }

    /// Links between the satellite and a user terminal.
    pub fn is_user_link(&self) -> bool {
        matches!(self, ChannelType::ForwardUser | ChannelType::ReturnUser)
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ChannelType {
    type Err = FadingError;

    /// Accepts the canonical names with or without the `_CH` suffix, in any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        let name = upper.strip_suffix("_CH").unwrap_or(&upper);
        ChannelType::ALL
            .into_iter()
            .find(|channel| channel.name() == name)
            .ok_or_else(|| FadingError::UnknownChannel(s.to_string()))
    }
}
