//! Channel player settings read from pmoconfig
//!
//! ```rust,ignore
//! use pmoconfig::get_config;
//! use pmochannel::ChannelConfigExt;
//!
//! let config = get_config();
//! let options = config.player_options()?;
//! let engine = config.engine_config()?;
//! ```

use crate::channel::PlayerOptions;
use crate::engine::EngineConfig;
use anyhow::Result;
use pmoconfig::Config;
use std::time::Duration;

/// Typed views over the `player`, `descriptor` and `engine` sections
pub trait ChannelConfigExt {
    /// Channel and poll interval from `player.channel` and `player.poll_ms`
    ///
    /// The interval is clamped like a `pollMs` query parameter.
    fn player_options(&self) -> Result<PlayerOptions>;

    /// Buffering configuration from `engine.max_buffer_length_secs`
    fn engine_config(&self) -> Result<EngineConfig>;

    /// Descriptor request timeout; `descriptor.timeout_secs = 0` means none
    fn descriptor_timeout(&self) -> Result<Option<Duration>>;

    fn descriptor_base_url(&self) -> Result<String>;

    /// Whether the streaming engine may be offered to the reconciler
    fn engine_enabled(&self) -> Result<bool>;

    /// Command and extra arguments of the native player
    fn native_player(&self) -> Result<(String, Vec<String>)>;
}

impl ChannelConfigExt for Config {
    fn player_options(&self) -> Result<PlayerOptions> {
        Ok(PlayerOptions::new(
            &self.get_player_channel()?,
            self.get_player_poll_ms()?,
        ))
    }

    fn engine_config(&self) -> Result<EngineConfig> {
        Ok(EngineConfig {
            max_buffer_length: Duration::from_secs(self.get_engine_max_buffer_length_secs()?),
        })
    }

    fn descriptor_timeout(&self) -> Result<Option<Duration>> {
        let secs = self.get_descriptor_timeout_secs()?;
        Ok((secs > 0).then(|| Duration::from_secs(secs)))
    }

    fn descriptor_base_url(&self) -> Result<String> {
        self.get_descriptor_base_url()
    }

    fn engine_enabled(&self) -> Result<bool> {
        self.get_engine_enabled()
    }

    fn native_player(&self) -> Result<(String, Vec<String>)> {
        Ok((self.get_native_command()?, self.get_native_args()?))
    }
}
