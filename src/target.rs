use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;

use crate::config::DockerConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanTarget {
    File(PathBuf),
    FetchUrl(String),
}

impl ScanTarget {
    pub fn describe(&self) -> String {
        match self {
            ScanTarget::File(path) => path.display().to_string(),
            ScanTarget::FetchUrl(url) => url.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TargetRequest {
    pub file: Option<PathBuf>,
    pub fetch_url: Option<String>,
    pub image: Option<String>,
}

pub fn resolve(
    req: &TargetRequest,
    docker: &DockerConfig,
    cache_dir: &Path,
    timeout: Duration,
) -> Result<ScanTarget> {
    if let Some(file) = &req.file {
        if !file.exists() {
            return Err(crate::exit::invalid_args(format!(
                "スキャン対象ファイルが見つかりません: {}",
                file.display()
            )));
        }
        return Ok(ScanTarget::File(file.clone()));
    }

    if let Some(url) = &req.fetch_url {
        let url = url.trim();
        if url.is_empty() {
            return Err(crate::exit::invalid_args(
                "--fetch-url は空にできません",
            ));
        }
        return Ok(ScanTarget::FetchUrl(url.to_string()));
    }

    if let Some(image) = &req.image {
        let image = image.trim();
        if image.is_empty() {
            return Err(crate::exit::invalid_args("--image は空にできません"));
        }
        let reference = image_reference(docker, image);
        let tar_path = export_image(&reference, image, docker, cache_dir, timeout)?;
        return Ok(ScanTarget::File(tar_path));
    }

    Err(crate::exit::invalid_args(
        "スキャン対象が設定されていません（--file / --fetch-url / --image のいずれかを指定してください）",
    ))
}

pub fn image_reference(docker: &DockerConfig, image: &str) -> String {
    let registry = docker.registry_url.trim();
    if registry.is_empty() {
        return image.to_string();
    }

    let registry = if registry.contains("://") {
        registry.to_string()
    } else {
        format!("{}://{}", docker.registry_protocol, registry)
    };
    let host = registry
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(registry.as_str());

    if host.ends_with('/') {
        format!("{host}{image}")
    } else {
        format!("{host}/{image}")
    }
}

pub fn tar_file_name(image: &str) -> String {
    format!("{}.tar", image.replace('/', "_"))
}

fn export_image(
    reference: &str,
    image: &str,
    docker: &DockerConfig,
    cache_dir: &Path,
    timeout: Duration,
) -> Result<PathBuf> {
    std::fs::create_dir_all(cache_dir).map_err(|e| {
        crate::exit::external_cmd(format!(
            "キャッシュディレクトリの作成に失敗しました: {}: {e}",
            cache_dir.display()
        ))
    })?;

    if !docker.registry_url.trim().is_empty() {
        let pull = crate::platform::run_command("docker", &["pull", reference], timeout)
            .map_err(|e| crate::exit::external_cmd(format!("docker pull に失敗しました: {e}")))?;
        if pull.exit_code != 0 {
            let stderr = pull.stderr.trim();
            return Err(crate::exit::external_cmd(format!(
                "外部コマンドが失敗しました（exit_code={}）: docker pull {reference}\n{stderr}",
                pull.exit_code
            )));
        }
    }

    let tar_path = cache_dir.join(tar_file_name(image));
    let tar_s = tar_path.display().to_string();
    let save = crate::platform::run_command(
        "docker",
        &["save", reference, "-o", tar_s.as_str()],
        timeout,
    )
    .map_err(|e| crate::exit::external_cmd(format!("docker save に失敗しました: {e}")))?;
    if save.exit_code != 0 {
        let stderr = save.stderr.trim();
        return Err(crate::exit::external_cmd(format!(
            "外部コマンドが失敗しました（exit_code={}）: docker save {reference}\n{stderr}",
            save.exit_code
        )));
    }

    Ok(tar_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docker(registry_url: &str, protocol: &str) -> DockerConfig {
        DockerConfig {
            registry_url: registry_url.to_string(),
            registry_protocol: protocol.to_string(),
        }
    }

    #[test]
    fn image_reference_without_registry_is_image_itself() {
        let d = docker("", "https");
        assert_eq!(image_reference(&d, "library/alpine:3.20"), "library/alpine:3.20");
    }

    #[test]
    fn image_reference_joins_registry_without_double_slash() {
        let d = docker("registry.example.com/", "https");
        assert_eq!(
            image_reference(&d, "team/app:1.0"),
            "registry.example.com/team/app:1.0"
        );

        let d = docker("registry.example.com", "https");
        assert_eq!(
            image_reference(&d, "team/app:1.0"),
            "registry.example.com/team/app:1.0"
        );
    }

    #[test]
    fn image_reference_strips_scheme_for_docker_cli() {
        let d = docker("https://registry.example.com", "https");
        assert_eq!(
            image_reference(&d, "team/app:1.0"),
            "registry.example.com/team/app:1.0"
        );
    }

    #[test]
    fn tar_file_name_flattens_slashes() {
        assert_eq!(tar_file_name("team/app:1.0"), "team_app:1.0.tar");
    }

    #[test]
    fn resolve_requires_some_target() {
        let d = docker("", "https");
        let req = TargetRequest {
            file: None,
            fetch_url: None,
            image: None,
        };
        let err = resolve(&req, &d, Path::new("/tmp"), Duration::from_secs(1)).unwrap_err();
        assert_eq!(crate::exit::exit_code(&err), 2);
    }

    #[test]
    fn resolve_missing_file_is_invalid_args() {
        let d = docker("", "https");
        let req = TargetRequest {
            file: Some(PathBuf::from("/nonexistent/scangate-test.tar")),
            fetch_url: None,
            image: None,
        };
        let err = resolve(&req, &d, Path::new("/tmp"), Duration::from_secs(1)).unwrap_err();
        assert_eq!(crate::exit::exit_code(&err), 2);
    }
}
