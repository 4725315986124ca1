use std::collections::BTreeMap;

use crate::{ArrayNum, Attributes, Crs, CrsInput, Error, GeoTransform, RasterArray, RasterConfig, RasterSize, Rect, Result};

/// Collection of named raster arrays sharing their spatial dimensions.
///
/// Spatial operations are applied to every variable that carries both spatial dimensions,
/// the other variables are passed through unchanged.
#[derive(Debug, Clone)]
pub struct RasterDataset<T: ArrayNum> {
    vars: BTreeMap<String, RasterArray<T>>,
    attrs: Attributes,
}

impl<T: ArrayNum> Default for RasterDataset<T> {
    fn default() -> Self {
        RasterDataset {
            vars: BTreeMap::new(),
            attrs: Attributes::new(),
        }
    }
}

impl<T: ArrayNum> RasterDataset<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_var(mut self, name: &str, arr: RasterArray<T>) -> Self {
        self.insert(name, arr);
        self
    }

    pub fn with_attrs(mut self, attrs: Attributes) -> Self {
        self.attrs = attrs;
        self
    }

    pub fn insert(&mut self, name: &str, arr: RasterArray<T>) {
        self.vars.insert(name.to_string(), arr.with_name(name));
    }

    pub fn get(&self, name: &str) -> Option<&RasterArray<T>> {
        self.vars.get(name)
    }

    pub fn attrs(&self) -> &Attributes {
        &self.attrs
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// All variables in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RasterArray<T>)> {
        self.vars.iter().map(|(name, arr)| (name.as_str(), arr))
    }

    /// Names of the variables that carry both spatial dimensions
    pub fn vars(&self, cfg: &RasterConfig) -> Vec<&str> {
        self.vars
            .iter()
            .filter(|(_, arr)| arr.has_spatial_dims(cfg))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// The only spatial variable of the dataset, for operations that work on a single array
    pub fn single_var(&self, cfg: &RasterConfig) -> Result<&RasterArray<T>> {
        match self.spatial_vars(cfg)?.as_slice() {
            [arr] => Ok(*arr),
            vars => Err(Error::SingleVariableDataset(format!(
                "found {} spatial variables ({})",
                vars.len(),
                self.vars(cfg).join(", ")
            ))),
        }
    }

    fn spatial_vars(&self, cfg: &RasterConfig) -> Result<Vec<&RasterArray<T>>> {
        let vars: Vec<&RasterArray<T>> = self.vars.values().filter(|arr| arr.has_spatial_dims(cfg)).collect();
        if vars.is_empty() {
            return Err(Error::MissingDimension(format!(
                "No variable with the spatial dimensions '{}' and '{}'",
                cfg.y_dim, cfg.x_dim
            )));
        }

        Ok(vars)
    }

    /// The CRS shared by the spatial variables, variables that disagree are an error
    pub fn crs(&self, cfg: &RasterConfig) -> Result<Option<Crs>> {
        let mut result: Option<(&str, Crs)> = None;
        for arr in self.spatial_vars(cfg)? {
            let Some(crs) = arr.crs()? else {
                continue;
            };

            if let Some((name, first)) = &result {
                if *first != crs {
                    return Err(Error::DimensionMismatch(format!(
                        "Variables '{name}' and '{}' have a different CRS ({first} <-> {crs})",
                        arr.name().unwrap_or_default()
                    )));
                }
            } else {
                result = Some((arr.name().unwrap_or_default(), crs));
            }
        }

        Ok(result.map(|(_, crs)| crs))
    }

    pub fn require_crs(&self, cfg: &RasterConfig) -> Result<Crs> {
        self.crs(cfg)?
            .ok_or_else(|| Error::MissingCrs("No CRS found on the dataset variables".into()))
    }

    /// The spatial size shared by the spatial variables
    pub fn raster_size(&self, cfg: &RasterConfig) -> Result<RasterSize> {
        let vars = self.spatial_vars(cfg)?;
        let size = vars[0].raster_size(cfg)?;
        for arr in &vars[1..] {
            let other = arr.raster_size(cfg)?;
            if other != size {
                return Err(Error::DimensionMismatch(format!(
                    "Variable '{}' has spatial size {other}, expected {size}",
                    arr.name().unwrap_or_default()
                )));
            }
        }

        Ok(size)
    }

    pub fn width(&self, cfg: &RasterConfig) -> Result<usize> {
        Ok(self.raster_size(cfg)?.cols)
    }

    pub fn height(&self, cfg: &RasterConfig) -> Result<usize> {
        Ok(self.raster_size(cfg)?.rows)
    }

    pub fn transform(&self, cfg: &RasterConfig) -> Result<GeoTransform> {
        self.raster_size(cfg)?;
        self.spatial_vars(cfg)?[0].transform(cfg)
    }

    pub fn bounds(&self, cfg: &RasterConfig) -> Result<Rect<f64>> {
        self.raster_size(cfg)?;
        self.spatial_vars(cfg)?[0].bounds(cfg)
    }

    pub fn resolution(&self, cfg: &RasterConfig) -> Result<(f64, f64)> {
        let transform = self.transform(cfg)?;
        Ok((transform.cell_size_x(), transform.cell_size_y()))
    }

    /// Attach the CRS to every variable, written in the configured WKT dialect
    pub fn write_crs(&self, crs: impl Into<CrsInput>, cfg: &RasterConfig) -> Result<Self> {
        let crs = Crs::resolve(crs)?;
        self.try_map_all(|arr| arr.clone().write_crs_as(&crs, cfg.wkt_version))
    }

    /// Verify the spatial variables agree on CRS and size
    pub fn validate(&self, cfg: &RasterConfig) -> Result<()> {
        self.raster_size(cfg)?;
        self.crs(cfg)?;
        Ok(())
    }

    /// Apply `f` to the spatial variables after verifying their consistency, other variables are copied
    pub fn try_map_spatial<F>(&self, cfg: &RasterConfig, f: F) -> Result<Self>
    where
        F: Fn(&RasterArray<T>) -> Result<RasterArray<T>>,
    {
        self.validate(cfg)?;

        let mut vars = BTreeMap::new();
        for (name, arr) in &self.vars {
            let arr = if arr.has_spatial_dims(cfg) { f(arr)? } else { arr.clone() };
            vars.insert(name.clone(), arr.with_name(name.as_str()));
        }

        Ok(RasterDataset {
            vars,
            attrs: self.attrs.clone(),
        })
    }

    fn try_map_all<F>(&self, f: F) -> Result<Self>
    where
        F: Fn(&RasterArray<T>) -> Result<RasterArray<T>>,
    {
        let vars = self
            .vars
            .iter()
            .map(|(name, arr)| Ok((name.clone(), f(arr)?)))
            .collect::<Result<_>>()?;

        Ok(RasterDataset {
            vars,
            attrs: self.attrs.clone(),
        })
    }
}
