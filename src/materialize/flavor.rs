//! JP-009: Runtime flavor specifics.

use crate::core::types::Flavor;

/// What a flavor contributes to shared templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlavorProfile {
    pub flavor: Flavor,
    pub base_image: &'static str,
    /// Dependency manifest file name
    pub manifest: &'static str,
    /// Entry source file name
    pub entry: &'static str,
    /// Env key switched to `production` in `config/.env`
    pub env_switch: &'static str,
    /// Human label used in the README
    pub label: &'static str,
}

const PYTHON: FlavorProfile = FlavorProfile {
    flavor: Flavor::Python,
    base_image: "python:3.11-slim",
    manifest: "requirements.txt",
    entry: "app.py",
    env_switch: "APP_ENV",
    label: "Python/FastAPI",
};

const NODE: FlavorProfile = FlavorProfile {
    flavor: Flavor::Node,
    base_image: "node:20-alpine",
    manifest: "package.json",
    entry: "server.js",
    env_switch: "NODE_ENV",
    label: "Node.js/express",
};

pub fn profile(flavor: Flavor) -> &'static FlavorProfile {
    match flavor {
        Flavor::Python => &PYTHON,
        Flavor::Node => &NODE,
    }
}

impl FlavorProfile {
    /// Compose `healthcheck.test` in flow form. The slim Python image has no
    /// curl, so it checks with the interpreter; alpine ships busybox wget.
    pub fn healthcheck(&self, port: u16, endpoint: &str) -> String {
        let url = format!("http://localhost:{}{}", port, endpoint);
        match self.flavor {
            Flavor::Python => format!(
                "[\"CMD\", \"python\", \"-c\", \"import urllib.request; urllib.request.urlopen('{}', timeout=3)\"]",
                url
            ),
            Flavor::Node => format!("[\"CMD\", \"wget\", \"-q\", \"-O\", \"-\", \"{}\"]", url),
        }
    }
}
