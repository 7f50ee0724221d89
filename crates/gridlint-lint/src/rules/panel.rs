//! Panel-level rules.

use crate::result::PanelRuleResults;
use crate::rule::PanelRuleFunc;
use crate::rules::{
    PANEL_TYPE_GAUGE, PANEL_TYPE_GRAPH, PANEL_TYPE_SINGLESTAT, PANEL_TYPE_STAT, PANEL_TYPE_TABLE,
    PANEL_TYPE_TIMESERIES,
};

pub fn new_panel_datasource_rule() -> PanelRuleFunc {
    PanelRuleFunc::new(
        "panel-datasource-rule",
        "Checks that each panel uses the templated datasource.",
        |dashboard, slot| {
            let mut r = PanelRuleResults::default();
            let Some(panel) = slot.as_panel() else {
                return r;
            };

            match panel.kind.as_str() {
                PANEL_TYPE_SINGLESTAT | PANEL_TYPE_GRAPH | PANEL_TYPE_TABLE
                | PANEL_TYPE_TIMESERIES => {
                    // That a templated datasource exists is another rule's
                    // responsibility; here we only check the panel points at one.
                    let templated = dashboard.templates_of_kind("datasource");
                    let mut allowed = Vec::with_capacity(templated.len() * 2);
                    for t in &templated {
                        allowed.push(format!("${}", t.name));
                        allowed.push(format!("${{{}}}", t.name));
                    }

                    let uid = panel
                        .datasource
                        .as_ref()
                        .and_then(|ds| ds.uid.as_deref())
                        .unwrap_or("");
                    if !allowed.iter().any(|a| a == uid) {
                        r.add_error(
                            dashboard,
                            slot,
                            &format!("does not use a templated datasource, uses '{}'", uid),
                        );
                    }
                }
                _ => {}
            }

            r
        },
    )
}

pub fn new_panel_title_description_rule() -> PanelRuleFunc {
    PanelRuleFunc::new(
        "panel-title-description-rule",
        "Checks that each panel has a title and description.",
        |dashboard, slot| {
            let mut r = PanelRuleResults::default();
            let Some(panel) = slot.as_panel() else {
                return r;
            };

            match panel.kind.as_str() {
                PANEL_TYPE_STAT | PANEL_TYPE_SINGLESTAT | PANEL_TYPE_GRAPH | PANEL_TYPE_TABLE
                | PANEL_TYPE_TIMESERIES | PANEL_TYPE_GAUGE => {
                    if panel.title.as_deref().unwrap_or("").is_empty() {
                        r.add_error(dashboard, slot, "has missing title");
                    }
                    if panel.description.as_deref().unwrap_or("").is_empty() {
                        r.add_error(dashboard, slot, "has missing description");
                    }
                }
                _ => {}
            }
            r
        },
    )
}

pub fn new_panel_units_rule() -> PanelRuleFunc {
    PanelRuleFunc::new(
        "panel-units-rule",
        "Checks that each panel uses a valid unit.",
        |dashboard, slot| {
            let mut r = PanelRuleResults::default();
            let Some(panel) = slot.as_panel() else {
                return r;
            };

            match panel.kind.as_str() {
                PANEL_TYPE_STAT | PANEL_TYPE_SINGLESTAT | PANEL_TYPE_GRAPH | PANEL_TYPE_TABLE
                | PANEL_TYPE_TIMESERIES | PANEL_TYPE_GAUGE => {
                    let unit = panel.unit().unwrap_or("");
                    if !VALID_UNITS.contains(&unit) {
                        r.add_error(
                            dashboard,
                            slot,
                            &format!("has no or invalid units defined: '{}'", unit),
                        );
                    }
                }
                _ => {}
            }
            r
        },
    )
}

pub fn new_panel_no_targets_rule() -> PanelRuleFunc {
    PanelRuleFunc::new(
        "panel-no-targets-rule",
        "Checks that each panel has at least one target.",
        |dashboard, slot| {
            let mut r = PanelRuleResults::default();
            let Some(panel) = slot.as_panel() else {
                return r;
            };

            match panel.kind.as_str() {
                PANEL_TYPE_STAT | PANEL_TYPE_SINGLESTAT | PANEL_TYPE_GRAPH | PANEL_TYPE_TABLE
                | PANEL_TYPE_TIMESERIES | PANEL_TYPE_GAUGE => {
                    if panel.targets.is_none() {
                        r.add_error(dashboard, slot, "has no targets");
                    }
                }
                _ => {}
            }
            r
        },
    )
}

/// Display unit ids the rendering platform understands. Panels declaring
/// anything else fall back to unformatted values at render time.
const VALID_UNITS: &[&str] = &[
    // Misc
    "none", "short", "percent", "percentunit", "humidity", "dB", "hex0x", "hex", "sci", "locale",
    "string", "bool", "bool_yes_no", "bool_on_off",
    // Data
    "bytes", "decbytes", "bits", "decbits", "kbytes", "deckbytes", "mbytes", "decmbytes",
    "gbytes", "decgbytes", "tbytes", "dectbytes", "pbytes", "decpbytes",
    // Data rate
    "binBps", "Bps", "binbps", "bps", "KiBs", "Kibits", "KBs", "Kbits", "MiBs", "Mibits", "MBs",
    "Mbits", "GiBs", "Gibits", "GBs", "Gbits", "TiBs", "Tibits", "TBs", "Tbits", "pps",
    // Time
    "hertz", "ns", "µs", "ms", "s", "m", "h", "d", "dtdurationms", "dtdurations", "dthms",
    "dtdhms", "timeticks", "clockms", "clocks",
    // Throughput
    "cps", "ops", "reqps", "rps", "wps", "iops", "cpm", "opm", "rpm", "wpm",
    // Date & time
    "dateTimeAsIso", "dateTimeAsIsoNoDateIfToday", "dateTimeAsUS", "dateTimeAsUSNoDateIfToday",
    "dateTimeAsLocal", "dateTimeAsLocalNoDateIfToday", "dateTimeFromNow",
    // Energy
    "watt", "kwatt", "megwatt", "gwatt", "mwatt", "Wm2", "voltamp", "kvoltamp", "voltampreact",
    "kvoltampreact", "watth", "watthperkg", "kwatth", "kwattm", "amph", "kamph", "mamph",
    "joule", "ev", "amp", "kamp", "mamp", "volt", "kvolt", "mvolt", "dBm", "ohm", "kohm", "Mohm",
    "farad", "µfarad", "nfarad", "pfarad", "ffarad", "henry", "mhenry", "µhenry", "lumens",
    // Temperature
    "celsius", "fahrenheit", "kelvin",
    // Length & mass
    "lengthmm", "lengthin", "lengthft", "lengthm", "lengthkm", "lengthmi", "massmg", "massg",
    "masslb", "masskg", "masst",
    // Pressure
    "pressurembar", "pressurebar", "pressurekbar", "pressurepa", "pressurehpa", "pressurekpa",
    "pressurehg", "pressurepsi",
    // Velocity & acceleration
    "velocityms", "velocitykmh", "velocitymph", "velocityknot", "accMS2", "accFS2", "accG",
    // Volume & flow
    "mlitre", "litre", "m3", "Nm3", "dm3", "gallons", "flowgpm", "flowcms", "flowcfs", "flowcfm",
    "litreh", "flowlpm", "flowmlpm", "lux",
    // Angle & area
    "degree", "radian", "grad", "arcmin", "arcsec", "areaM2", "areaF2", "areaMI2",
    // Concentration
    "ppm", "conppb", "conngm3", "conngNm3", "conµgm3", "conµgNm3", "conmgm3", "conmgNm3",
    "congm3", "congNm3", "conmgdL", "conmmolL", "conµmolL",
    // Currency
    "currencyUSD", "currencyGBP", "currencyEUR", "currencyJPY", "currencyRUB", "currencyUAH",
    "currencyBRL", "currencyDKK", "currencyISK", "currencyNOK", "currencySEK", "currencyCZK",
    "currencyCHF", "currencyPLN", "currencyBTC", "currencymBTC", "currencyµBTC", "currencyINR",
    "currencyKRW", "currencyIDR", "currencyPHP", "currencyVND",
];

#[cfg(test)]
#[path = "panel_tests.rs"]
mod tests;
