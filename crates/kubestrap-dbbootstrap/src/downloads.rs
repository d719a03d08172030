//! Trust bundle and SQL script downloads

use std::path::Path;

use kubestrap_aws::ObjectStore;

use crate::error::{BootstrapError, BootstrapErrorKind, Result};

/// Mode of the trust bundle: a public root, readable by everyone
pub const BUNDLE_MODE: u32 = 0o644;

/// Mode of the SQL script: may contain credentials, owner only
pub const SCRIPT_MODE: u32 = 0o600;

/// Download the TLS trust bundle from `url` to `dest`
pub async fn fetch_trust_bundle(client: &reqwest::Client, url: &str, dest: &Path) -> Result<()> {
    tracing::info!(url = %url, "downloading trust bundle");

    let fail = |message: String| {
        tracing::error!(url = %url, error = %message, "trust bundle download failed");
        BootstrapError::new(BootstrapErrorKind::CertificateDownload, message)
    };

    let response = client
        .get(url)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|e| fail(format!("GET {}: {}", url, e)))?;
    let body = response
        .bytes()
        .await
        .map_err(|e| fail(format!("reading {}: {}", url, e)))?;

    write_with_mode(dest, &body, BUNDLE_MODE)
        .await
        .map_err(|e| fail(format!("writing {}: {}", dest.display(), e)))?;

    tracing::info!(path = %dest.display(), bytes = body.len(), "trust bundle saved");
    Ok(())
}

/// Download `s3://bucket/key` to `dest`
pub async fn fetch_script(store: &dyn ObjectStore, bucket: &str, key: &str, dest: &Path) -> Result<()> {
    let fail = |message: String| {
        tracing::error!(bucket = %bucket, key = %key, error = %message, "script download failed");
        BootstrapError::new(BootstrapErrorKind::ScriptDownload, message)
    };

    let body = store
        .get_object(bucket, key)
        .await
        .map_err(|e| fail(format!("s3://{}/{}: {}", bucket, key, e)))?;

    write_with_mode(dest, &body, SCRIPT_MODE)
        .await
        .map_err(|e| fail(format!("writing {}: {}", dest.display(), e)))?;

    tracing::info!(bucket = %bucket, key = %key, "downloaded SQL script");
    Ok(())
}

/// Write `data` to `path`, creating parents, with `mode` from the start
///
/// An existing file is truncated and narrowed to `mode` as well.
async fn write_with_mode(path: &Path, data: &[u8], mode: u32) -> std::io::Result<()> {
    use tokio::io::AsyncWriteExt;

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(mode);

    let mut file = options.open(path).await?;
    file.write_all(data).await?;
    file.flush().await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kubestrap_aws::MockCloud;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[cfg(unix)]
    fn mode_of(path: &Path) -> u32 {
        use std::os::unix::fs::PermissionsExt;
        std::fs::metadata(path).unwrap().permissions().mode() & 0o777
    }

    #[tokio::test]
    async fn test_fetch_trust_bundle() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/global/global-bundle.pem"))
            .respond_with(ResponseTemplate::new(200).set_body_string("-----BEGIN CERTIFICATE-----"))
            .expect(1)
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("global-bundle.pem");

        fetch_trust_bundle(
            &reqwest::Client::new(),
            &format!("{}/global/global-bundle.pem", server.uri()),
            &dest,
        )
        .await
        .unwrap();

        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "-----BEGIN CERTIFICATE-----");
        #[cfg(unix)]
        assert_eq!(mode_of(&dest), 0o644);
    }

    #[tokio::test]
    async fn test_trust_bundle_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("global-bundle.pem");

        let err = fetch_trust_bundle(&reqwest::Client::new(), &server.uri(), &dest)
            .await
            .unwrap_err();

        assert_eq!(err.kind, BootstrapErrorKind::CertificateDownload);
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_trust_bundle_transport_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = fetch_trust_bundle(
            &reqwest::Client::new(),
            "http://127.0.0.1:1/global-bundle.pem",
            &dir.path().join("b.pem"),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind, BootstrapErrorKind::CertificateDownload);
    }

    #[tokio::test]
    async fn test_fetch_script_is_owner_only() {
        let cloud = MockCloud::new();
        cloud.with_object("bucket", "scripts/db/init.sql", b"CREATE TABLE IF NOT EXISTS t();");
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("sql/init.sql");

        fetch_script(&cloud, "bucket", "scripts/db/init.sql", &dest)
            .await
            .unwrap();

        assert_eq!(
            std::fs::read_to_string(&dest).unwrap(),
            "CREATE TABLE IF NOT EXISTS t();"
        );
        #[cfg(unix)]
        assert_eq!(mode_of(&dest), 0o600);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_fetch_script_narrows_existing_file() {
        use std::os::unix::fs::PermissionsExt;

        let cloud = MockCloud::new();
        cloud.with_object("bucket", "init.sql", b"SELECT 1;");
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("sql/init.sql");
        std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
        std::fs::write(&dest, "stale contents from an earlier run").unwrap();
        std::fs::set_permissions(&dest, std::fs::Permissions::from_mode(0o644)).unwrap();

        fetch_script(&cloud, "bucket", "init.sql", &dest).await.unwrap();

        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "SELECT 1;");
        assert_eq!(mode_of(&dest), 0o600);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_new_file_is_created_with_mode() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("secret.sql");

        write_with_mode(&dest, b"x", SCRIPT_MODE).await.unwrap();
        assert_eq!(mode_of(&dest), 0o600);
    }

    #[tokio::test]
    async fn test_missing_script() {
        let dir = tempfile::tempdir().unwrap();
        let err = fetch_script(&MockCloud::new(), "bucket", "missing.sql", &dir.path().join("x.sql"))
            .await
            .unwrap_err();

        assert_eq!(err.kind, BootstrapErrorKind::ScriptDownload);
        assert!(err.message.contains("s3://bucket/missing.sql"));
    }
}
