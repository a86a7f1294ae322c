//! Rendering of the charts embedded into the extension
//!
//! Rendering is reached through the [`ChartRenderer`] capability so the actuator can be
//! exercised with a test double. The bundled [`StaticChartRenderer`] emits chart templates
//! verbatim; the gVisor chart is plain manifests and is rendered with empty values.
use gvisor_core::gvisor;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Key of the rendered gVisor chart in the managed resource secret
pub const GVISOR_CONFIG_KEY: &str = "config.yaml";

/// Namespace charts targeting the shoot's system components are rendered into
pub const NAMESPACE_SYSTEM: &str = "kube-system";

/// Failures while rendering a chart
#[derive(Error, Debug)]
pub enum RenderError {
    /// The chart path has no `Chart.yaml`
    #[error("chart {0:?} not found")]
    ChartNotFound(String),

    /// The `Chart.yaml` could not be parsed
    #[error("failed to parse {path}: {source}")]
    ParseChartMetadata {
        /// Path of the `Chart.yaml`
        path: String,
        /// The underlying parse error
        #[source]
        source: serde_yaml::Error,
    },

    /// A template uses template actions
    #[error("template {0} requires templating which is not supported")]
    UnsupportedTemplate(String),

    /// Values were passed for a chart that is rendered verbatim
    #[error("chart {0} does not accept values")]
    UnsupportedValues(String),

    /// The kubernetes version of the target could not be parsed
    #[error("invalid kubernetes version {0:?}")]
    InvalidVersion(String),
}

/// A set of chart files compiled into the binary, keyed by their path below `charts/`
#[derive(Debug)]
pub struct EmbeddedChart {
    files: &'static [(&'static str, &'static str)],
}

/// The charts shipped with the extension
pub static INTERNAL_CHART: EmbeddedChart = EmbeddedChart {
    files: &[
        (
            "internal/gvisor/Chart.yaml",
            include_str!("../charts/internal/gvisor/Chart.yaml"),
        ),
        (
            "internal/gvisor/templates/runtimeclass.yaml",
            include_str!("../charts/internal/gvisor/templates/runtimeclass.yaml"),
        ),
    ],
};

impl EmbeddedChart {
    /// Build a chart from static `(path, content)` pairs
    pub const fn new(files: &'static [(&'static str, &'static str)]) -> Self {
        Self { files }
    }

    /// The content of the file at `path`
    pub fn get(&self, path: &str) -> Option<&'static str> {
        self.files.iter().find(|(p, _)| *p == path).map(|(_, content)| *content)
    }

    /// All files directly or indirectly below `dir`, with paths relative to `dir`
    pub fn files_under<'a>(&'a self, dir: &'a str) -> impl Iterator<Item = (&'static str, &'static str)> + 'a {
        self.files.iter().filter_map(move |(path, content)| {
            path.strip_prefix(dir)
                .and_then(|rest| rest.strip_prefix('/'))
                .map(|rest| (rest, *content))
        })
    }
}

/// One rendered manifest file
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Manifest {
    /// Name of the file within the chart, e.g. `gvisor/templates/runtimeclass.yaml`
    pub name: String,
    /// Rendered content
    pub content: String,
}

/// The result of rendering a chart
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedChart {
    /// Name from `Chart.yaml`
    pub chart_name: String,
    /// Rendered manifests, ordered by name
    pub manifests: Vec<Manifest>,
}

impl RenderedChart {
    /// All manifests as one multi-document YAML stream
    pub fn manifest(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for manifest in &self.manifests {
            out.extend_from_slice(b"\n---\n");
            out.extend_from_slice(manifest.content.as_bytes());
        }
        out
    }
}

/// Renders embedded charts
pub trait ChartRenderer {
    /// Render the chart at `chart_path` of `chart` as release `release_name` into `namespace`
    fn render_embedded(
        &self,
        chart: &EmbeddedChart,
        chart_path: &str,
        release_name: &str,
        namespace: &str,
        values: &Map<String, Value>,
    ) -> Result<RenderedChart, RenderError>;
}

/// Creates [`ChartRenderer`]s for a target cluster
pub trait ChartRendererFactory {
    /// The renderer type created
    type Renderer: ChartRenderer;

    /// A renderer targeting a shoot running `kubernetes_version`
    fn new_chart_renderer_for_shoot(&self, kubernetes_version: &str) -> Result<Self::Renderer, RenderError>;
}

/// Renders chart templates verbatim
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StaticChartRenderer {
    kubernetes_version: (u32, u32),
}

/// Creates [`StaticChartRenderer`]s
#[derive(Clone, Copy, Debug, Default)]
pub struct StaticChartRendererFactory;

#[derive(Deserialize)]
struct ChartMetadata {
    name: String,
}

impl StaticChartRenderer {
    /// A renderer for a cluster running `version`, e.g. `1.31.1` or `v1.31`
    pub fn new(version: &str) -> Result<Self, RenderError> {
        let invalid = || RenderError::InvalidVersion(version.to_owned());
        let mut parts = version.strip_prefix('v').unwrap_or(version).split('.');
        let major = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
        let minor = parts
            .next()
            .and_then(|p| p.split(['-', '+']).next())
            .and_then(|p| p.parse().ok())
            .ok_or_else(invalid)?;
        Ok(Self {
            kubernetes_version: (major, minor),
        })
    }

    /// Major and minor version of the target cluster
    pub fn kubernetes_version(&self) -> (u32, u32) {
        self.kubernetes_version
    }
}

impl ChartRenderer for StaticChartRenderer {
    fn render_embedded(
        &self,
        chart: &EmbeddedChart,
        chart_path: &str,
        release_name: &str,
        namespace: &str,
        values: &Map<String, Value>,
    ) -> Result<RenderedChart, RenderError> {
        let metadata_path = format!("{chart_path}/Chart.yaml");
        let metadata = chart
            .get(&metadata_path)
            .ok_or_else(|| RenderError::ChartNotFound(chart_path.to_owned()))?;
        let ChartMetadata { name: chart_name } =
            serde_yaml::from_str(metadata).map_err(|source| RenderError::ParseChartMetadata {
                path: metadata_path,
                source,
            })?;
        if !values.is_empty() {
            return Err(RenderError::UnsupportedValues(chart_name));
        }
        tracing::debug!(
            chart = %chart_name,
            release = release_name,
            namespace,
            kubernetes_version = ?self.kubernetes_version,
            "rendering chart"
        );

        let mut manifests = Vec::new();
        for (file, content) in chart.files_under(chart_path) {
            let Some(template) = file.strip_prefix("templates/") else {
                continue;
            };
            let is_yaml = template.ends_with(".yaml") || template.ends_with(".yml");
            if !is_yaml || template.rsplit('/').next().is_some_and(|f| f.starts_with('_')) {
                continue;
            }
            let name = format!("{chart_name}/templates/{template}");
            if content.contains("{{") {
                return Err(RenderError::UnsupportedTemplate(name));
            }
            if content.trim().is_empty() {
                continue;
            }
            manifests.push(Manifest {
                name,
                content: content.to_owned(),
            });
        }
        manifests.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(RenderedChart {
            chart_name,
            manifests,
        })
    }
}

impl ChartRendererFactory for StaticChartRendererFactory {
    type Renderer = StaticChartRenderer;

    fn new_chart_renderer_for_shoot(&self, kubernetes_version: &str) -> Result<StaticChartRenderer, RenderError> {
        StaticChartRenderer::new(kubernetes_version)
    }
}

/// Render the gVisor chart into a manifest stream
pub fn render_gvisor_chart(renderer: &impl ChartRenderer) -> Result<Vec<u8>, RenderError> {
    let values = Map::new();
    let release = renderer.render_embedded(
        &INTERNAL_CHART,
        gvisor::CHART_PATH,
        gvisor::RELEASE_NAME,
        NAMESPACE_SYSTEM,
        &values,
    )?;
    Ok(release.manifest())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingRenderer {
        calls: Mutex<Vec<(String, String, String, Map<String, Value>)>>,
    }

    impl ChartRenderer for RecordingRenderer {
        fn render_embedded(
            &self,
            chart: &EmbeddedChart,
            chart_path: &str,
            release_name: &str,
            namespace: &str,
            values: &Map<String, Value>,
        ) -> Result<RenderedChart, RenderError> {
            assert!(std::ptr::eq(chart, &INTERNAL_CHART));
            self.calls.lock().unwrap().push((
                chart_path.to_owned(),
                release_name.to_owned(),
                namespace.to_owned(),
                values.clone(),
            ));
            Ok(RenderedChart {
                chart_name: "test".into(),
                manifests: vec![Manifest {
                    name: format!("test/templates/{GVISOR_CONFIG_KEY}"),
                    content: "test-content".into(),
                }],
            })
        }
    }

    #[test]
    fn renders_gvisor_chart_with_fixed_arguments() {
        let renderer = RecordingRenderer::default();
        let rendered = render_gvisor_chart(&renderer).unwrap();
        assert_eq!(rendered, b"\n---\ntest-content");

        let calls = renderer.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (path, release, namespace, values) = &calls[0];
        assert_eq!(path, "internal/gvisor");
        assert_eq!(release, "gvisor");
        assert_eq!(namespace, "kube-system");
        assert!(values.is_empty());
    }

    #[test]
    fn static_renderer_emits_runtime_class() {
        let renderer = StaticChartRendererFactory.new_chart_renderer_for_shoot("1.31.1").unwrap();
        let manifest = String::from_utf8(render_gvisor_chart(&renderer).unwrap()).unwrap();
        assert!(manifest.starts_with("\n---\n"));

        let docs: Vec<serde_yaml::Value> = manifest
            .split("\n---\n")
            .filter(|d| !d.trim().is_empty())
            .map(|d| serde_yaml::from_str(d).unwrap())
            .collect();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["kind"], "RuntimeClass");
        assert_eq!(docs[0]["handler"], "runsc");
        assert_eq!(
            docs[0]["scheduling"]["nodeSelector"]["containerruntime.worker.gardener.cloud/gvisor"],
            "true"
        );
    }

    #[test]
    fn static_renderer_names_manifests_after_chart() {
        let renderer = StaticChartRenderer::new("1.30.0").unwrap();
        let rendered = renderer
            .render_embedded(&INTERNAL_CHART, "internal/gvisor", "gvisor", "kube-system", &Map::new())
            .unwrap();
        assert_eq!(rendered.chart_name, "gvisor");
        assert_eq!(rendered.manifests[0].name, "gvisor/templates/runtimeclass.yaml");
    }

    #[test]
    fn static_renderer_rejects_templating() {
        static CHART: EmbeddedChart = EmbeddedChart::new(&[
            ("c/Chart.yaml", "name: c\nversion: 0.1.0\n"),
            ("c/templates/_helpers.tpl", "{{ define \"x\" }}{{ end }}"),
            ("c/templates/empty.yaml", "\n"),
            ("c/templates/cm.yaml", "kind: ConfigMap\nmetadata:\n  name: {{ .Release.Name }}\n"),
        ]);
        let renderer = StaticChartRenderer::new("1.30").unwrap();
        let err = renderer
            .render_embedded(&CHART, "c", "r", "default", &Map::new())
            .unwrap_err();
        assert!(matches!(err, RenderError::UnsupportedTemplate(name) if name == "c/templates/cm.yaml"));

        let mut values = Map::new();
        values.insert("replicas".into(), Value::from(2));
        let err = renderer
            .render_embedded(&INTERNAL_CHART, "internal/gvisor", "gvisor", "kube-system", &values)
            .unwrap_err();
        assert!(matches!(err, RenderError::UnsupportedValues(_)));

        let err = renderer
            .render_embedded(&INTERNAL_CHART, "internal/missing", "r", "default", &Map::new())
            .unwrap_err();
        assert!(matches!(err, RenderError::ChartNotFound(_)));
    }

    #[test]
    fn parses_kubernetes_versions() {
        assert_eq!(StaticChartRenderer::new("1.31.1").unwrap().kubernetes_version(), (1, 31));
        assert_eq!(StaticChartRenderer::new("v1.29").unwrap().kubernetes_version(), (1, 29));
        assert_eq!(StaticChartRenderer::new("1.32-rc.1").unwrap().kubernetes_version(), (1, 32));
        for invalid in ["", "1", "one.two", "1.x.3"] {
            assert!(matches!(
                StaticChartRenderer::new(invalid),
                Err(RenderError::InvalidVersion(_))
            ));
        }
    }
}
