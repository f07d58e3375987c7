// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use std::{error::Error, fmt, str::FromStr};

/// Whether samples are stored as integers or floats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    /// Integer samples (e.g., 16-bit, 24-bit, 32-bit)
    Int,
    /// Floating point samples
    Float,
}

impl FromStr for SampleFormat {
    type Err = Box<dyn Error>;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "float" => Ok(SampleFormat::Float),
            "int" => Ok(SampleFormat::Int),
            _ => Err(format!("Unsupported sample format: {}", s).into()),
        }
    }
}

impl SampleFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            SampleFormat::Float => "float",
            SampleFormat::Int => "int",
        }
    }

    /// Maps the format and bit depth onto a cpal stream sample format.
    pub fn to_cpal(self, bits_per_sample: u16) -> Result<cpal::SampleFormat, Box<dyn Error>> {
        match (self, bits_per_sample) {
            (SampleFormat::Float, 32) => Ok(cpal::SampleFormat::F32),
            (SampleFormat::Float, 64) => Ok(cpal::SampleFormat::F64),
            (SampleFormat::Int, 16) => Ok(cpal::SampleFormat::I16),
            (SampleFormat::Int, 32) => Ok(cpal::SampleFormat::I32),
            _ => Err(format!(
                "Unsupported output format: {} bit {}",
                bits_per_sample, self
            )
            .into()),
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
