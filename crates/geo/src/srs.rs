//! Coordinate reference system handles.
//!
//! A [`Crs`] can be resolved from an EPSG code, an `EPSG:nnnn` authority string, a proj string
//! or a WKT1/WKT2 definition. Projection math is performed by `proj4rs`, EPSG definitions are looked up
//! in `crs-definitions` and WKT definitions without a known EPSG authority are translated with `proj4wkt`.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use proj4rs::Proj;
use proj4rs::proj::ProjType;
use proj4wkt::wkt_to_projstring;

use crate::crs::{Epsg, epsg};
use crate::{AttrValue, Error, LabeledArray, Result};

/// Attribute holding a CRS definition (EPSG code, authority string, proj string or WKT)
pub const CRS_ATTR: &str = "crs";
/// CF convention attribute holding the WKT of the grid mapping
pub const CRS_WKT_ATTR: &str = "crs_wkt";
/// GDAL compatible attribute holding the WKT of the grid mapping
pub const SPATIAL_REF_ATTR: &str = "spatial_ref";

const WKT_ROOTS: [&str; 7] = ["GEOGCS[", "PROJCS[", "GEOCCS[", "VERT_CS[", "LOCAL_CS[", "COMPD_CS[", "FITTED_CS["];
const WKT2_ROOTS: [&str; 12] = [
    "GEODCRS[",
    "GEOGCRS[",
    "GEODETICCRS[",
    "GEOGRAPHICCRS[",
    "PROJCRS[",
    "PROJECTEDCRS[",
    "VERTCRS[",
    "ENGCRS[",
    "COMPOUNDCRS[",
    "BOUNDCRS[",
    "PARAMETRICCRS[",
    "TIMECRS[",
];

/// Proj parameters that carry no meaning for CRS equivalence
const IGNORED_PROJ_PARAMS: [&str; 3] = ["no_defs", "wktext", "type"];

/// WKT dialects that can be requested on export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WktVersion {
    #[default]
    Wkt1Gdal,
    Wkt1Esri,
    Wkt2_2015,
    Wkt2_2019,
}

impl WktVersion {
    fn is_wkt2(&self) -> bool {
        matches!(self, WktVersion::Wkt2_2015 | WktVersion::Wkt2_2019)
    }
}

impl FromStr for WktVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().replace('-', "_").as_str() {
            "WKT1" | "WKT1_GDAL" => Ok(WktVersion::Wkt1Gdal),
            "WKT1_ESRI" => Ok(WktVersion::Wkt1Esri),
            "WKT2_2015" => Ok(WktVersion::Wkt2_2015),
            "WKT2" | "WKT2_2018" | "WKT2_2019" => Ok(WktVersion::Wkt2_2019),
            _ => Err(Error::InvalidArgument(format!("Unsupported WKT version: {s}"))),
        }
    }
}

impl std::fmt::Display for WktVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            WktVersion::Wkt1Gdal => "WKT1_GDAL",
            WktVersion::Wkt1Esri => "WKT1_ESRI",
            WktVersion::Wkt2_2015 => "WKT2_2015",
            WktVersion::Wkt2_2019 => "WKT2_2019",
        };
        f.write_str(name)
    }
}

/// The accepted ways of specifying a coordinate reference system
#[derive(Debug, Clone)]
pub enum CrsInput {
    Epsg(Epsg),
    /// Authority string, proj string or WKT
    Definition(String),
    Crs(Crs),
}

impl From<Epsg> for CrsInput {
    fn from(epsg: Epsg) -> Self {
        CrsInput::Epsg(epsg)
    }
}

impl From<u16> for CrsInput {
    fn from(code: u16) -> Self {
        CrsInput::Epsg(Epsg::from(code))
    }
}

impl From<&str> for CrsInput {
    fn from(def: &str) -> Self {
        CrsInput::Definition(def.to_string())
    }
}

impl From<String> for CrsInput {
    fn from(def: String) -> Self {
        CrsInput::Definition(def)
    }
}

impl From<Crs> for CrsInput {
    fn from(crs: Crs) -> Self {
        CrsInput::Crs(crs)
    }
}

impl From<&Crs> for CrsInput {
    fn from(crs: &Crs) -> Self {
        CrsInput::Crs(crs.clone())
    }
}

#[derive(Debug)]
struct CrsDefinition {
    proj: Proj,
    proj_str: String,
    epsg: Option<Epsg>,
    /// The WKT text the CRS was created from
    wkt: Option<String>,
    wkt2: bool,
    params: BTreeMap<String, String>,
}

/// Immutable, cheaply clonable coordinate reference system handle.
///
/// Equality is semantic: two handles are equal when they refer to the same EPSG code, or
/// when their normalized projection parameters are identical.
#[derive(Clone)]
pub struct Crs(Arc<CrsDefinition>);

impl Crs {
    /// Resolve any supported CRS input into a handle
    pub fn resolve(input: impl Into<CrsInput>) -> Result<Self> {
        match input.into() {
            CrsInput::Epsg(epsg) => Crs::from_epsg(epsg),
            CrsInput::Definition(def) => Crs::from_definition(&def),
            CrsInput::Crs(crs) => Ok(crs),
        }
    }

    pub fn from_epsg(epsg: Epsg) -> Result<Self> {
        let proj_str = crs_definitions::from_code(epsg.code())
            .map(|def| def.proj4.to_string())
            .ok_or_else(|| Error::InvalidCrs(format!("Unknown EPSG code {}", epsg.code())))?;

        Self::create(&proj_str, Some(epsg), None)
    }

    pub fn from_proj(projection: &str) -> Result<Self> {
        if projection.trim().is_empty() {
            return Err(Error::InvalidCrs("Empty projection string".into()));
        }

        Self::create(projection.trim(), None, None)
    }

    /// Create from a WKT1 or WKT2 definition.
    /// The EPSG authority of the root element is honoured when present.
    pub fn from_wkt(wkt: &str) -> Result<Self> {
        let wkt = wkt.trim();
        if !is_wkt_string(wkt) {
            return Err(Error::InvalidCrs(format!("Not a WKT definition: {wkt}")));
        }

        let epsg = root_authority_epsg(wkt).filter(|epsg| crs_definitions::from_code(epsg.code()).is_some());
        let proj_str = match epsg.and_then(|epsg| crs_definitions::from_code(epsg.code())) {
            Some(def) => def.proj4.to_string(),
            None => wkt_to_projstring(wkt).map_err(|e| Error::InvalidCrs(format!("Failed to parse WKT string ({e})")))?,
        };

        Self::create(&proj_str, epsg, Some(wkt.to_string()))
    }

    /// Create from a textual definition: `EPSG:nnnn`, a bare EPSG number, `WGS84`, a proj string or WKT
    pub fn from_definition(def: &str) -> Result<Self> {
        let def = def.trim();
        if def.is_empty() {
            return Err(Error::InvalidCrs("Empty CRS definition".into()));
        }

        if let Some(code) = strip_prefix_ignore_case(def, "EPSG:") {
            let code = code
                .trim()
                .parse::<u16>()
                .map_err(|_| Error::InvalidCrs(format!("Invalid EPSG code: {def}")))?;
            return Crs::from_epsg(code.into());
        }

        if let Ok(code) = def.parse::<u16>() {
            return Crs::from_epsg(code.into());
        }

        if def.eq_ignore_ascii_case("WGS84") {
            return Crs::from_epsg(epsg::WGS84);
        }

        if is_wkt_string(def) {
            return Crs::from_wkt(def);
        }

        if def.starts_with('+') || def.contains("+proj=") {
            return Crs::from_proj(def);
        }

        Err(Error::InvalidCrs(format!("Unrecognized CRS definition: {def}")))
    }

    fn create(proj_str: &str, epsg: Option<Epsg>, wkt: Option<String>) -> Result<Self> {
        let proj = Proj::from_proj_string(proj_str).map_err(|e| Error::InvalidCrs(format!("{proj_str} ({e})")))?;
        let wkt2 = wkt.as_deref().is_some_and(is_wkt2_string);

        Ok(Crs(Arc::new(CrsDefinition {
            proj,
            proj_str: proj_str.to_string(),
            epsg,
            wkt,
            wkt2,
            params: normalized_proj_params(proj_str),
        })))
    }

    pub fn epsg(&self) -> Option<Epsg> {
        self.0.epsg
    }

    pub fn is_geographic(&self) -> bool {
        self.0.proj.projection_type() == ProjType::Latlong
    }

    pub fn is_projected(&self) -> bool {
        !self.is_geographic()
    }

    pub fn to_proj(&self) -> &str {
        &self.0.proj_str
    }

    /// The linear unit of a projected CRS (`m` when unspecified), `None` for geographic systems
    pub fn linear_units(&self) -> Option<&str> {
        if self.is_geographic() {
            return None;
        }

        Some(self.0.params.get("units").map(String::as_str).unwrap_or("m"))
    }

    /// Export as WKT in the requested dialect.
    ///
    /// WKT2 output is only available for systems that were created from WKT2 text,
    /// other dialects fall back to WKT1_GDAL with a warning.
    pub fn to_wkt(&self, version: WktVersion) -> Result<String> {
        if version.is_wkt2() && self.0.wkt2 {
            if let Some(wkt) = &self.0.wkt {
                return Ok(wkt.clone());
            }
        }

        if version != WktVersion::Wkt1Gdal {
            log::warn!("{version} export is not supported for {self}, falling back to WKT1_GDAL");
        }

        if let Some(def) = self.0.epsg.and_then(|epsg| crs_definitions::from_code(epsg.code())) {
            return Ok(def.wkt.to_string());
        }

        match &self.0.wkt {
            Some(wkt) if !self.0.wkt2 => Ok(wkt.clone()),
            _ => Err(Error::Runtime(format!(
                "Failed to generate WKT for projection because of missing EPSG code ({self})"
            ))),
        }
    }

    /// The most descriptive textual definition available: WKT1 when possible, the proj string otherwise
    pub fn to_definition(&self) -> String {
        match self.0.epsg.and_then(|epsg| crs_definitions::from_code(epsg.code())) {
            Some(def) => def.wkt.to_string(),
            None => self.0.wkt.clone().unwrap_or_else(|| self.0.proj_str.clone()),
        }
    }

    /// WKT in the requested dialect, [`Crs::to_definition`] when no WKT can be generated
    pub fn to_definition_as(&self, version: WktVersion) -> String {
        self.to_wkt(version).unwrap_or_else(|_| self.to_definition())
    }

    pub(crate) fn proj(&self) -> &Proj {
        &self.0.proj
    }
}

impl PartialEq for Crs {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.0, &other.0) {
            return true;
        }

        match (self.0.epsg, other.0.epsg) {
            (Some(lhs), Some(rhs)) => lhs == rhs,
            _ => self.0.params == other.0.params,
        }
    }
}

impl std::fmt::Display for Crs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0.epsg {
            Some(epsg) => write!(f, "{epsg}"),
            None => write!(f, "{}", self.0.proj_str),
        }
    }
}

impl std::fmt::Debug for Crs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Crs({self})")
    }
}

impl FromStr for Crs {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Crs::from_definition(s)
    }
}

/// Convert any supported CRS input to WKT
pub fn crs_to_wkt(input: impl Into<CrsInput>, version: WktVersion) -> Result<String> {
    Crs::resolve(input)?.to_wkt(version)
}

/// Resolve the CRS of a labeled array.
///
/// The explicit CRS takes precedence, followed by the `crs`, `crs_wkt` and `spatial_ref` attributes.
pub fn crs_from_metadata<A: LabeledArray + ?Sized>(arr: &A) -> Result<Option<Crs>> {
    if let Some(crs) = arr.explicit_crs() {
        return Ok(Some(crs.clone()));
    }

    for key in [CRS_ATTR, CRS_WKT_ATTR, SPATIAL_REF_ATTR] {
        match arr.attrs().get(key) {
            Some(AttrValue::Str(def)) => return Crs::from_definition(def).map(Some),
            Some(AttrValue::Int(code)) => {
                let code = u16::try_from(*code).map_err(|_| Error::InvalidCrs(format!("Invalid EPSG code: {code}")))?;
                return Crs::from_epsg(code.into()).map(Some);
            }
            Some(other) => return Err(Error::InvalidCrs(format!("Unsupported '{key}' attribute value: {other:?}"))),
            None => {}
        }
    }

    Ok(None)
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &s[prefix.len()..])
}

fn starts_with_root(s: &str, roots: &[&str]) -> bool {
    roots.iter().any(|root| strip_prefix_ignore_case(s.trim_start(), root).is_some())
}

fn is_wkt_string(s: &str) -> bool {
    starts_with_root(s, &WKT_ROOTS) || starts_with_root(s, &WKT2_ROOTS)
}

fn is_wkt2_string(s: &str) -> bool {
    starts_with_root(s, &WKT2_ROOTS)
}

/// The EPSG code of the `AUTHORITY[..]` (WKT1) or `ID[..]` (WKT2) element of the root node
fn root_authority_epsg(wkt: &str) -> Option<Epsg> {
    let bytes = wkt.as_bytes();
    let mut depth = 0usize;
    let mut in_quotes = false;
    let mut result = None;

    for (i, &c) in bytes.iter().enumerate() {
        match c {
            b'"' => in_quotes = !in_quotes,
            b'[' | b'(' if !in_quotes => depth += 1,
            b']' | b')' if !in_quotes => depth = depth.saturating_sub(1),
            _ if !in_quotes && depth == 1 && i > 0 && matches!(bytes[i - 1], b',' | b' ' | b'\t' | b'\r' | b'\n') => {
                let Some(rest) = wkt.get(i..) else {
                    continue;
                };

                for keyword in ["AUTHORITY[", "ID["] {
                    if let Some(body) = strip_prefix_ignore_case(rest, keyword) {
                        if let Some(epsg) = parse_authority_body(body) {
                            result = Some(epsg);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    result
}

fn parse_authority_body(body: &str) -> Option<Epsg> {
    let end = body.find([']', '[']).unwrap_or(body.len());
    let mut fields = body[..end].split(',').map(|f| f.trim().trim_matches('"'));
    let name = fields.next()?;
    let code = fields.next()?;
    if !name.eq_ignore_ascii_case("EPSG") {
        return None;
    }

    code.parse::<u16>().ok().map(Epsg::from)
}

fn normalize_param_value(value: &str) -> String {
    value
        .split(',')
        .map(|part| match part.trim().parse::<f64>() {
            Ok(num) => num.to_string(),
            Err(_) => part.trim().to_ascii_lowercase(),
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn normalized_proj_params(proj_str: &str) -> BTreeMap<String, String> {
    proj_str
        .split_whitespace()
        .filter_map(|token| {
            let token = token.trim_start_matches('+');
            let (key, value) = token.split_once('=').unwrap_or((token, ""));
            let key = key.to_ascii_lowercase();
            if key.is_empty() || IGNORED_PROJ_PARAMS.contains(&key.as_str()) {
                return None;
            }

            Some((key, normalize_param_value(value)))
        })
        .collect()
}
