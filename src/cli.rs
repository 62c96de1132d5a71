use std::io::{self, IsTerminal};
use std::sync::Arc;

use crate::config::Config;
use crate::die;
use crate::providers::providers::VertexBackend;
use crate::providers::ModelBackend;
use crate::registry::populate::{populated_resolver, vertex_backend};
use crate::registry::resolver::Resolver;
use crate::RequestedColorMode;

pub(crate) mod generate;
pub(crate) mod headline;
pub(crate) mod list;
mod output;
pub(crate) mod probe;
pub(crate) mod resolve;

#[derive(Clone, Copy, strum_macros::Display)]
pub(crate) enum ColorMode {
    On,
    Off,
}

impl ColorMode {
    /// Returns whether ANSI color should be used
    /// If the user has specified a preference, this is honored. This preference
    /// can be specified through the command line or the "NO_COLOR" environment
    /// variable If the user hasn't stated a preference, color is enabled if the
    /// output is a terminal.
    pub(crate) fn resolve_auto(cm: RequestedColorMode) -> ColorMode {
        match cm {
            RequestedColorMode::Auto => {
                let disable_color =
                    std::env::var_os("NO_COLOR").is_some() || !io::stderr().is_terminal();

                if disable_color {
                    ColorMode::Off
                } else {
                    ColorMode::On
                }
            }
            RequestedColorMode::On => ColorMode::On,
            RequestedColorMode::Off => ColorMode::Off,
        }
    }
}

/// The platform client and a resolver over it.
pub(crate) struct Session {
    pub backend: Arc<VertexBackend>,
    pub resolver: Resolver,
}

impl Session {
    pub(crate) fn from_backend(config: &Config, backend: Arc<VertexBackend>) -> Session {
        let model_backend: Arc<dyn ModelBackend> = backend.clone();

        let resolver = match populated_resolver(config, model_backend) {
            Ok(resolver) => resolver,
            Err(err) => die!("{}", err),
        };

        Session { backend, resolver }
    }
}

pub(crate) fn session_or_die(config: &Config) -> Session {
    let backend = match vertex_backend(config) {
        Ok(backend) => backend,
        Err(err) => die!("{}", err),
    };

    Session::from_backend(config, backend)
}
