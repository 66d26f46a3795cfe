use crate::config::{Algorithm, SchemeConfig};
use crate::error::Result;
use crate::flow_key::FlowKey;
use crate::fourier::FourierScheme;
use crate::omniwindow::OmniWindowScheme;
use crate::persist_cms::PersistCmsScheme;
use crate::scheme::{Query, Rebuilt, Scheme, SchemeStats};
use crate::wavelet::WaveletScheme;

/// Any of the concrete schemes, chosen at runtime from a config.
pub enum Sketch {
    Wavelet(WaveletScheme),
    Fourier(FourierScheme),
    OmniWindow(OmniWindowScheme),
    PersistCms(PersistCmsScheme),
}

impl Sketch {
    pub fn from_config(config: &SchemeConfig) -> Result<Self> {
        Ok(match config.algorithm {
            Algorithm::Wavelet => Sketch::Wavelet(WaveletScheme::new(config)?),
            Algorithm::Fourier => Sketch::Fourier(FourierScheme::new(config)?),
            Algorithm::OmniWindow => Sketch::OmniWindow(OmniWindowScheme::new(config)?),
            Algorithm::PersistCms => Sketch::PersistCms(PersistCmsScheme::new(config)?),
        })
    }

    fn inner(&self) -> &dyn Scheme {
        match self {
            Sketch::Wavelet(s) => s,
            Sketch::Fourier(s) => s,
            Sketch::OmniWindow(s) => s,
            Sketch::PersistCms(s) => s,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Scheme {
        match self {
            Sketch::Wavelet(s) => s,
            Sketch::Fourier(s) => s,
            Sketch::OmniWindow(s) => s,
            Sketch::PersistCms(s) => s,
        }
    }
}

impl Scheme for Sketch {
    fn algorithm(&self) -> Algorithm {
        self.inner().algorithm()
    }

    fn count(&mut self, key: &FlowKey, timestamp_us: u64, value: u32) {
        self.inner_mut().count(key, timestamp_us, value)
    }

    fn flush(&mut self) {
        self.inner_mut().flush()
    }

    fn rebuild(&mut self, query: &Query) -> Rebuilt {
        self.inner_mut().rebuild(query)
    }

    fn reset(&mut self) {
        self.inner_mut().reset()
    }

    fn memory_usage(&self) -> usize {
        self.inner().memory_usage()
    }

    fn memory_budget(&self) -> usize {
        self.inner().memory_budget()
    }

    fn top_k(&self) -> usize {
        self.inner().top_k()
    }

    fn window_us(&self) -> u64 {
        self.inner().window_us()
    }

    fn stats(&self) -> &SchemeStats {
        self.inner().stats()
    }
}
