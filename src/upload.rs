//! Publishing global output files to an object store.

use crate::CombineError;
use std::path::{Path, PathBuf};
use tracing::info;

pub trait ObjectStoreLike {
    /// Upload the file at `path` to `key`, requesting server-side encryption.
    fn put_file(&self, path: &Path, key: &str) -> Result<(), CombineError>;
}

fn file_name(path: &Path) -> Result<String, CombineError> {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| CombineError::Upload(format!("{} has no file name", path.display())))
}

/// Upload each file twice: once under `prefix` (when given) and once at the
/// bucket root. The first failure aborts.
pub fn upload_outputs(
    store: &dyn ObjectStoreLike,
    files: &[PathBuf],
    prefix: Option<&str>,
) -> Result<(), CombineError> {
    for path in files {
        let name = file_name(path)?;
        if let Some(prefix) = prefix.map(|p| p.trim_matches('/')).filter(|p| !p.is_empty()) {
            store.put_file(path, &format!("{}/{}", prefix, name))?;
        }
        store.put_file(path, &name)?;
        info!(path = %path.display(), "Uploaded");
    }
    Ok(())
}

#[cfg(feature = "upload")]
pub use s3::{S3Store, S3StoreConfig};

#[cfg(feature = "upload")]
mod s3 {
    use super::ObjectStoreLike;
    use crate::CombineError;
    use aws_config::{BehaviorVersion, Region};
    use aws_sdk_s3::{primitives::ByteStream, types::ServerSideEncryption, Client};
    use std::fs;
    use std::path::Path;
    use tokio::runtime::Runtime;

    const DEFAULT_REGION: &str = "us-west-2";

    #[derive(Debug, Clone)]
    pub struct S3StoreConfig {
        pub bucket: String,
        pub region: String,
        pub endpoint: Option<String>,
    }

    impl S3StoreConfig {
        pub fn from_env(bucket: &str) -> Self {
            let region = std::env::var("COMBINE_S3_REGION")
                .ok()
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| DEFAULT_REGION.to_string());
            let endpoint = std::env::var("COMBINE_S3_ENDPOINT").ok().filter(|e| !e.is_empty());
            Self {
                bucket: bucket.to_string(),
                region,
                endpoint,
            }
        }
    }

    pub struct S3Store {
        client: Client,
        bucket: String,
        runtime: Runtime,
    }

    impl S3Store {
        pub fn new(config: S3StoreConfig) -> Result<Self, CombineError> {
            let runtime = Runtime::new()
                .map_err(|e| CombineError::Upload(format!("tokio runtime error: {}", e)))?;
            let region = Region::new(config.region.clone());
            let base_config = runtime.block_on(
                aws_config::defaults(BehaviorVersion::latest())
                    .region(region.clone())
                    .load(),
            );

            let mut s3_builder = aws_sdk_s3::config::Builder::from(&base_config).region(region);
            if let Some(endpoint) = &config.endpoint {
                s3_builder = s3_builder.endpoint_url(endpoint);
                s3_builder = s3_builder.force_path_style(true);
            }

            Ok(Self {
                client: Client::from_conf(s3_builder.build()),
                bucket: config.bucket,
                runtime,
            })
        }
    }

    impl ObjectStoreLike for S3Store {
        fn put_file(&self, path: &Path, key: &str) -> Result<(), CombineError> {
            let bytes = fs::read(path)?;
            self.runtime
                .block_on(
                    self.client
                        .put_object()
                        .bucket(&self.bucket)
                        .key(key)
                        .server_side_encryption(ServerSideEncryption::AwsKms)
                        .body(ByteStream::from(bytes))
                        .send(),
                )
                .map_err(|e| CombineError::Upload(format!("S3 put {}/{}: {}", self.bucket, key, e)))?;
            Ok(())
        }
    }
}
