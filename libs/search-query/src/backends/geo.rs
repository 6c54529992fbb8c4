//! Geo-spatial filtering
//!
//! Handles `geo_distance`, `geo_polygon` and `geo_bounding_box` lookups on
//! `geo_spatial_filter_fields`. The pivot of a `geo_distance` filter is recorded on
//! the request so an `ordering` on the same field can sort by distance from it.

use super::field_clauses;
use crate::context::SearchContext;
use crate::dsl::{GeoPoint, Query};
use crate::error::{QueryError, Result};
use crate::fields::FieldConfig;
use crate::lookup::parse_options;
use crate::params::split_positional;
use crate::request::SearchRequest;
use crate::view::ViewConfig;

const DISTANCE_TYPES: &[&str] = &["arc", "plane"];
const DISTANCE_UNITS: &[&str] = &[
    "mi", "miles", "yd", "yards", "ft", "feet", "in", "inch", "km", "kilometers", "m", "meters",
    "cm", "centimeters", "mm", "millimeters", "NM", "nmi", "nauticalmiles",
];

pub fn apply(request: &SearchRequest, ctx: &SearchContext, view: &ViewConfig) -> Result<SearchRequest> {
    let mut out = request.clone();
    for (field, clause) in field_clauses(&view.geo_fields, &ctx.params)? {
        if let Query::GeoDistance { point, .. } = &clause {
            out = out.with_geo_pivot(&field.document_path, *point);
        }
        out = out.with_filter(clause);
    }
    Ok(out)
}

/// Parse `lat,lon`.
pub fn parse_point(param: &str, raw: &str) -> Result<GeoPoint> {
    let Some((lat, lon)) = raw.split_once(',') else {
        return Err(QueryError::bad_geo(param, format!("expected 'lat,lon', got '{raw}'")));
    };
    parse_lat_lon(param, lat, lon)
}

pub fn parse_lat_lon(param: &str, lat: &str, lon: &str) -> Result<GeoPoint> {
    let coordinate = |raw: &str, limit: f64, what: &str| -> Result<f64> {
        let value = raw
            .trim()
            .parse::<f64>()
            .map_err(|_| QueryError::bad_geo(param, format!("invalid {what} '{}'", raw.trim())))?;
        if !value.is_finite() || value.abs() > limit {
            return Err(QueryError::bad_geo(param, format!("{what} {value} out of range")));
        }
        Ok(value)
    };
    Ok(GeoPoint {
        lat: coordinate(lat, 90.0, "latitude")?,
        lon: coordinate(lon, 180.0, "longitude")?,
    })
}

fn validate_distance(param: &str, raw: &str) -> Result<String> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(raw.len());
    let (number, unit) = raw.split_at(split);
    let valid_number = number.parse::<f64>().map(|n| n > 0.0).unwrap_or(false);
    if !valid_number || !(unit.is_empty() || DISTANCE_UNITS.contains(&unit)) {
        return Err(QueryError::bad_geo(param, format!("invalid distance '{raw}'")));
    }
    Ok(raw.to_string())
}

pub(crate) fn validate_distance_type(param: &str, raw: &str) -> Result<String> {
    let raw = raw.trim();
    if !DISTANCE_TYPES.contains(&raw) {
        return Err(QueryError::bad_geo(param, format!("invalid distance type '{raw}'")));
    }
    Ok(raw.to_string())
}

/// `distance|lat|lon[|distance_type]`
pub(crate) fn build_geo_distance(field: &FieldConfig, param: &str, value: &str) -> Result<Option<Query>> {
    let parts = split_positional(value);
    if !(3..=4).contains(&parts.len()) {
        return Err(QueryError::bad_geo(param, "expected 'distance|lat|lon[|distance_type]'"));
    }
    let distance = validate_distance(param, parts[0])?;
    let point = parse_lat_lon(param, parts[1], parts[2])?;
    let distance_type = match parts.get(3).filter(|s| !s.is_empty()) {
        Some(raw) => Some(validate_distance_type(param, raw)?),
        None => None,
    };
    Ok(Some(Query::GeoDistance {
        field: field.document_path.clone(),
        distance,
        point,
        distance_type,
    }))
}

/// `lat,lon|lat,lon|lat,lon[|_name:x][|validation_method:y]`
pub(crate) fn build_geo_polygon(field: &FieldConfig, param: &str, value: &str) -> Result<Option<Query>> {
    let parts = split_positional(value);
    let (option_parts, point_parts): (Vec<&str>, Vec<&str>) =
        parts.into_iter().filter(|p| !p.is_empty()).partition(|p| p.contains(':'));
    let points = point_parts
        .iter()
        .map(|p| parse_point(param, p))
        .collect::<Result<Vec<_>>>()?;
    if points.len() < 3 {
        return Err(QueryError::bad_geo(param, "a polygon needs at least three points"));
    }
    let options = parse_options(param, &option_parts, &["_name", "validation_method"])?;
    Ok(Some(Query::GeoPolygon {
        field: field.document_path.clone(),
        points,
        options,
    }))
}

/// `tl_lat,tl_lon|br_lat,br_lon[|_name:x][|validation_method:y][|type:z]`
pub(crate) fn build_geo_bounding_box(field: &FieldConfig, param: &str, value: &str) -> Result<Option<Query>> {
    let parts = split_positional(value);
    if parts.len() < 2 {
        return Err(QueryError::bad_geo(param, "expected 'top_left|bottom_right'"));
    }
    let top_left = parse_point(param, parts[0])?;
    let bottom_right = parse_point(param, parts[1])?;
    if top_left.lat < bottom_right.lat {
        return Err(QueryError::bad_geo(param, "top-left latitude is below bottom-right latitude"));
    }
    let options = parse_options(param, &parts[2..], &["_name", "validation_method", "type"])?;
    Ok(Some(Query::GeoBoundingBox {
        field: field.document_path.clone(),
        top_left,
        bottom_right,
        options,
    }))
}
