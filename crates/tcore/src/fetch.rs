#![forbid(unsafe_code)]

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write as _};
use std::path::Path;

use tracing::info;

use crate::error::{Result, TcoreError};

/// Downloads a remote resource to a local file.
pub trait Fetcher {
    fn fetch(&self, url: &str, dest: &Path) -> Result<()>;
}

/// Plain HTTP(S) GET with no verification beyond what the transport does.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpFetcher;

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> Result<()> {
        info!(url, dest = %dest.display(), "downloading");

        let response = ureq::get(url).call().map_err(|err| TcoreError::Download {
            url: url.to_string(),
            reason: err.to_string(),
        })?;

        if let Some(parent) = dest.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| TcoreError::io(parent, err))?;
        }

        let file = File::create(dest).map_err(|err| TcoreError::io(dest, err))?;
        let mut writer = BufWriter::new(file);
        let mut reader = BufReader::new(response.into_reader());
        std::io::copy(&mut reader, &mut writer).map_err(|err| TcoreError::Download {
            url: url.to_string(),
            reason: err.to_string(),
        })?;
        writer.flush().map_err(|err| TcoreError::io(dest, err))?;

        Ok(())
    }
}
