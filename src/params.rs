// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Parameters of the decoder component.
//!
//! The component reads them once per `start()`; changes made while running only apply to the
//! next session.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;
use serde::Serialize;
use vda::PixelFormat;
use vda::Profile;

use crate::allocator::BlockPool;
use crate::allocator::MemoryUsage;
use crate::error::Error;
use crate::error::Result;

// Use the same number as ACodec.
const DPB_OUTPUT_BUFFER_EXTRA_COUNT: u32 = 3;
const FETCH_MAX_RETRIES: u32 = 32;
const FETCH_RETRY_DELAY_US: u64 = 1000;
const MAX_FETCH_FAILURES: u32 = 3;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default, rename_all = "kebab-case")]
pub struct DecoderConfig {
    /// Codec profile of the input bitstream.
    pub profile: Profile,
    /// Pixel format the accelerator decodes into.
    pub output_format: PixelFormat,
    /// Output buffers allocated on top of the minimum requested by the accelerator.
    pub extra_output_buffers: u32,
    /// Whether the output buffers must be allocated from protected memory.
    pub secure: bool,
    /// How many times a timed out block fetch is retried before giving up.
    pub fetch_max_retries: u32,
    pub fetch_retry_delay_us: u64,
    /// Consecutive failed fetches tolerated before giving up on the session.
    pub max_fetch_failures: u32,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        DecoderConfig {
            profile: Profile::H264ProfileMain,
            output_format: PixelFormat::NV12,
            extra_output_buffers: DPB_OUTPUT_BUFFER_EXTRA_COUNT,
            secure: false,
            fetch_max_retries: FETCH_MAX_RETRIES,
            fetch_retry_delay_us: FETCH_RETRY_DELAY_US,
            max_fetch_failures: MAX_FETCH_FAILURES,
        }
    }
}

impl DecoderConfig {
    /// Parses a JSON document. Missing fields take their default value.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let config: DecoderConfig =
            serde_json::from_str(json).context("failed to parse decoder config")?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a JSON config file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("failed to read decoder config {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("in {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.fetch_max_retries == 0 {
            return Err(Error::InvalidConfig("fetch-max-retries must be at least 1"));
        }
        if self.max_fetch_failures == 0 {
            return Err(Error::InvalidConfig("max-fetch-failures must be at least 1"));
        }
        Ok(())
    }

    pub fn fetch_retry_delay(&self) -> Duration {
        Duration::from_micros(self.fetch_retry_delay_us)
    }

    pub fn memory_usage(&self) -> MemoryUsage {
        MemoryUsage::decoder_output(self.secure)
    }
}

/// What the decode driver needs to start a session.
#[derive(Clone)]
pub struct StartParams {
    pub config: DecoderConfig,
    pub block_pool: Arc<dyn BlockPool>,
}

/// Parameter store of a decoder component.
pub struct ComponentIntf {
    name: String,
    config: DecoderConfig,
    block_pool: Arc<dyn BlockPool>,
}

impl ComponentIntf {
    pub fn new(
        name: impl Into<String>,
        config: DecoderConfig,
        block_pool: Arc<dyn BlockPool>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(ComponentIntf {
            name: name.into(),
            config,
            block_pool,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub(crate) fn set_config(&mut self, config: DecoderConfig) -> Result<()> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    pub(crate) fn snapshot(&self) -> StartParams {
        StartParams {
            config: self.config.clone(),
            block_pool: Arc::clone(&self.block_pool),
        }
    }
}
