use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Datasource plugin id for Prometheus-family metric queries.
pub const DATASOURCE_PROMETHEUS: &str = "prometheus";
/// Datasource plugin id for Loki log queries.
pub const DATASOURCE_LOKI: &str = "loki";

/// Template variable kind for query-backed variables.
pub const VARIABLE_KIND_QUERY: &str = "query";
/// Template variable kind for datasource pickers.
pub const VARIABLE_KIND_DATASOURCE: &str = "datasource";

/// `refresh` value meaning "refresh on time range change".
pub const REFRESH_ON_TIME_RANGE_CHANGE: i64 = 2;

/// A dashboard definition as parsed from its JSON representation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dashboard {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub editable: Option<bool>,
    #[serde(default)]
    pub templating: Templating,
    #[serde(default)]
    pub panels: Vec<PanelOrRow>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl Dashboard {
    /// Parse a dashboard from raw JSON bytes.
    pub fn from_json(buf: &[u8]) -> Result<Dashboard, serde_json::Error> {
        serde_json::from_slice(buf)
    }

    /// All template variables whose kind matches `kind` (case-insensitive).
    pub fn templates_of_kind(&self, kind: &str) -> Vec<&TemplateVariable> {
        self.templating
            .list
            .iter()
            .filter(|t| t.kind.eq_ignore_ascii_case(kind))
            .collect()
    }

    /// The template variable named `name`, if any.
    pub fn template(&self, name: &str) -> Option<&TemplateVariable> {
        self.templating.list.iter().find(|t| t.name == name)
    }

    /// The first datasource-kind template variable, if any.
    pub fn template_datasource(&self) -> Option<&TemplateVariable> {
        self.templating
            .list
            .iter()
            .find(|t| t.kind == VARIABLE_KIND_DATASOURCE)
    }

    /// Classify a target's query payload.
    ///
    /// The query language is resolved from the most specific datasource
    /// declaration available: the target's own, then the panel's, then the
    /// dashboard's templated datasource. Targets that still have no known
    /// language but do carry an expression are treated as metric queries,
    /// which is how dashboard tooling decodes them in practice.
    pub fn classify_query(&self, panel: &Panel, target: &Target) -> DataQuery {
        let kind = target
            .datasource
            .as_ref()
            .and_then(|d| d.kind.as_deref())
            .or_else(|| panel.datasource.as_ref().and_then(|d| d.kind.as_deref()))
            .or_else(|| {
                self.template_datasource()
                    .and_then(|t| t.query.as_ref())
                    .and_then(QueryValue::as_str)
            });

        let expr = target.expr.clone().unwrap_or_default();
        let hide = target.hide.unwrap_or(false);

        match kind {
            Some(DATASOURCE_LOKI) => DataQuery::Loki(LokiQuery { expr, hide }),
            Some(DATASOURCE_PROMETHEUS) => DataQuery::Prometheus(PromQuery { expr, hide }),
            Some(_) => DataQuery::Unknown,
            None if target.expr.is_some() => DataQuery::Prometheus(PromQuery { expr, hide }),
            None => DataQuery::Unknown,
        }
    }
}

/// The dashboard's template variable block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Templating {
    #[serde(default)]
    pub list: Vec<TemplateVariable>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// One dashboard-scoped template variable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateVariable {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<QueryValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datasource: Option<DataSourceRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<VariableOption>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<VariableOption>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multi: Option<bool>,
    #[serde(rename = "allValue", skip_serializing_if = "Option::is_none")]
    pub all_value: Option<String>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// A template variable query: either a plain string or a structured object,
/// depending on the datasource plugin.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
    Text(String),
    Object(Value),
}

impl QueryValue {
    /// The query as a string, when it is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            QueryValue::Text(s) => Some(s),
            QueryValue::Object(_) => None,
        }
    }
}

/// A selectable template variable option, or the current selection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VariableOption {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<OptionValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<OptionValue>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// An option value: a single string for plain variables, a list for
/// multi-selects.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Single(String),
    Many(Vec<String>),
    Other(Value),
}

impl OptionValue {
    /// The value as a single string, when it is one.
    pub fn as_single(&self) -> Option<&str> {
        match self {
            OptionValue::Single(s) => Some(s),
            _ => None,
        }
    }
}

/// A reference to a datasource by uid and plugin type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataSourceRef {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// A dashboard panel slot: either a row header or a data panel.
///
/// The JSON schema distinguishes the two by `type == "row"`, so this cannot
/// be an ordinary untagged union; rows and panels share most field names.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum PanelOrRow {
    Row(RowPanel),
    Panel(Panel),
}

impl PanelOrRow {
    pub fn is_row(&self) -> bool {
        matches!(self, PanelOrRow::Row(_))
    }

    pub fn as_panel(&self) -> Option<&Panel> {
        match self {
            PanelOrRow::Panel(p) => Some(p),
            PanelOrRow::Row(_) => None,
        }
    }

    pub fn title(&self) -> Option<&str> {
        match self {
            PanelOrRow::Row(r) => r.title.as_deref(),
            PanelOrRow::Panel(p) => p.title.as_deref(),
        }
    }

    pub fn id(&self) -> Option<u32> {
        match self {
            PanelOrRow::Row(r) => r.id,
            PanelOrRow::Panel(p) => p.id,
        }
    }
}

impl<'de> Deserialize<'de> for PanelOrRow {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let is_row = value.get("type").and_then(Value::as_str) == Some("row");
        if is_row {
            RowPanel::deserialize(value)
                .map(PanelOrRow::Row)
                .map_err(serde::de::Error::custom)
        } else {
            Panel::deserialize(value)
                .map(PanelOrRow::Panel)
                .map_err(serde::de::Error::custom)
        }
    }
}

/// A row grouping header. Rows render no data themselves; collapsed rows may
/// nest their member panels, which the linter leaves untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowPanel {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub panels: Vec<Panel>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl Default for RowPanel {
    fn default() -> Self {
        RowPanel {
            id: None,
            kind: "row".to_string(),
            title: None,
            panels: Vec::new(),
            other: Map::new(),
        }
    }
}

/// A data-rendering panel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Panel {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datasource: Option<DataSourceRef>,
    /// `None` when the panel declares no `targets` key at all, which is
    /// distinct from an explicitly empty list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub targets: Option<Vec<Target>>,
    #[serde(rename = "fieldConfig", skip_serializing_if = "Option::is_none")]
    pub field_config: Option<FieldConfigSource>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl Panel {
    /// The panel's targets, empty when none are declared.
    pub fn targets(&self) -> &[Target] {
        self.targets.as_deref().unwrap_or(&[])
    }

    /// The declared unit id, if any.
    pub fn unit(&self) -> Option<&str> {
        self.field_config
            .as_ref()
            .and_then(|fc| fc.defaults.unit.as_deref())
    }
}

/// One query attached to a panel, as stored in the schema.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Target {
    #[serde(rename = "refId", skip_serializing_if = "Option::is_none")]
    pub ref_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hide: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datasource: Option<DataSourceRef>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// Field configuration block carrying display options such as units.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldConfigSource {
    #[serde(default)]
    pub defaults: FieldConfig,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// A target's query payload, classified once per lint pass.
#[derive(Debug, Clone, PartialEq)]
pub enum DataQuery {
    Prometheus(PromQuery),
    Loki(LokiQuery),
    Unknown,
}

/// A metric query in the Prometheus family.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PromQuery {
    pub expr: String,
    pub hide: bool,
}

/// A log query in the Loki family.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LokiQuery {
    pub expr: String,
    pub hide: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "title": "Service overview",
        "uid": "svc",
        "editable": false,
        "schemaVersion": 39,
        "templating": {
            "list": [
                {
                    "name": "datasource",
                    "type": "datasource",
                    "label": "Data source",
                    "query": "prometheus"
                },
                {
                    "name": "job",
                    "type": "query",
                    "current": {"text": "api", "value": "api"},
                    "options": [{"value": ["a", "b"]}]
                }
            ]
        },
        "panels": [
            {"type": "row", "id": 1, "title": "Traffic"},
            {
                "type": "timeseries",
                "id": 2,
                "title": "QPS",
                "datasource": {"uid": "$datasource"},
                "targets": [{"refId": "A", "expr": "sum(rate(requests_total[5m]))"}],
                "fieldConfig": {"defaults": {"unit": "reqps"}}
            }
        ]
    }"#;

    #[test]
    fn parse_sample_dashboard() {
        let d = Dashboard::from_json(SAMPLE.as_bytes()).unwrap();
        assert_eq!(d.title.as_deref(), Some("Service overview"));
        assert_eq!(d.editable, Some(false));
        assert_eq!(d.panels.len(), 2);
        assert!(d.panels[0].is_row());
        let panel = d.panels[1].as_panel().unwrap();
        assert_eq!(panel.kind, "timeseries");
        assert_eq!(panel.targets().len(), 1);
        assert_eq!(panel.unit(), Some("reqps"));
    }

    #[test]
    fn unknown_fields_round_trip() {
        let d = Dashboard::from_json(SAMPLE.as_bytes()).unwrap();
        let value = serde_json::to_value(&d).unwrap();
        assert_eq!(value["schemaVersion"], 39);
        // Round-trip through the model again.
        let again: Dashboard = serde_json::from_value(value).unwrap();
        assert_eq!(again.other.get("schemaVersion"), d.other.get("schemaVersion"));
    }

    #[test]
    fn template_lookups() {
        let d = Dashboard::from_json(SAMPLE.as_bytes()).unwrap();
        assert_eq!(d.templates_of_kind("datasource").len(), 1);
        assert_eq!(d.templates_of_kind("DATASOURCE").len(), 1);
        assert!(d.template("job").is_some());
        assert!(d.template("instance").is_none());
        let ds = d.template_datasource().unwrap();
        assert_eq!(ds.query.as_ref().and_then(QueryValue::as_str), Some("prometheus"));
    }

    #[test]
    fn option_value_forms() {
        let d = Dashboard::from_json(SAMPLE.as_bytes()).unwrap();
        let job = d.template("job").unwrap();
        let current = job.current.as_ref().unwrap();
        assert_eq!(current.value.as_ref().unwrap().as_single(), Some("api"));
        // A multi-select option is not a single value.
        assert_eq!(job.options[0].value.as_ref().unwrap().as_single(), None);
    }

    #[test]
    fn classify_by_template_datasource() {
        let d = Dashboard::from_json(SAMPLE.as_bytes()).unwrap();
        let panel = d.panels[1].as_panel().unwrap();
        let query = d.classify_query(panel, &panel.targets()[0]);
        match query {
            DataQuery::Prometheus(q) => {
                assert_eq!(q.expr, "sum(rate(requests_total[5m]))");
                assert!(!q.hide);
            }
            other => panic!("expected a metric query, got {:?}", other),
        }
    }

    #[test]
    fn classify_prefers_target_datasource() {
        let d = Dashboard::from_json(SAMPLE.as_bytes()).unwrap();
        let panel = d.panels[1].as_panel().unwrap();
        let target = Target {
            expr: Some("{job=\"mysql\"}".to_string()),
            datasource: Some(DataSourceRef {
                kind: Some("loki".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(matches!(d.classify_query(panel, &target), DataQuery::Loki(_)));
    }

    #[test]
    fn classify_defaults_to_metrics_when_expression_present() {
        let d = Dashboard::default();
        let panel = Panel {
            datasource: Some(DataSourceRef {
                uid: Some("foo".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let target = Target {
            expr: Some("something_total".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            d.classify_query(&panel, &target),
            DataQuery::Prometheus(_)
        ));
        // No expression and no datasource type: nothing to classify.
        assert_eq!(d.classify_query(&panel, &Target::default()), DataQuery::Unknown);
    }
}
