//! Projection reference handling.
//!
//! Everything goes through OGR's attribute lookup: `attr_value(node, j)`
//! finds the first node called `node` that has children (searching the
//! root, then its immediate children, then depth-first) and returns the
//! value of its `j`th child.

use std::io::{self, Write};

use gdal::spatial_ref::SpatialRef;

use crate::commons::basic_functions::{get_spaces, leading_int};
use crate::commons::global_variables::{
    MAX_PROJECTION_DEPTH, METER_UNIT_NAMES, PROJECTION_NODES,
};
use crate::error::DemError;

/// Read access to the attribute tree of a spatial reference
pub trait SrsAttributes {
    /// Value of the `child`th child of the node called `node`, `None` when
    /// the node or the child is missing
    fn attr_value(&self, node: &str, child: usize) -> Option<String>;

    /// Number of children of the node called `node`
    fn child_count(&self, node: &str) -> usize {
        (0..).take_while(|&j| self.attr_value(node, j).is_some()).count()
    }
}

impl SrsAttributes for SpatialRef {
    fn attr_value(&self, node: &str, child: usize) -> Option<String> {
        self.get_attr_value(node, child).ok().flatten()
    }
}

/// Check that the linear unit is meters with a multiplier of 1
pub fn check_linear_unit<S: SrsAttributes + ?Sized>(srs: &S) -> Result<(), DemError> {
    let unit = srs.attr_value("UNIT", 0).unwrap_or_default();
    if !METER_UNIT_NAMES
        .iter()
        .any(|name| name.eq_ignore_ascii_case(&unit))
    {
        return Err(DemError::NotMeters(unit));
    }

    let multiplier = leading_int(&srs.attr_value("UNIT", 1).unwrap_or_default());
    if multiplier != 1 {
        return Err(DemError::ZScale(multiplier));
    }
    Ok(())
}

/// Dump `name` and its subtree. A child is treated as a subtree when a node
/// of that name has children of its own.
pub fn write_node<W, S>(out: &mut W, srs: &S, name: &str, level: usize) -> io::Result<()>
where
    W: Write + ?Sized,
    S: SrsAttributes + ?Sized,
{
    let spaces = get_spaces(level);
    let count = srs.child_count(name);
    writeln!(out, "  {}{} [{} children]:", spaces, name, count)?;
    for j in 0..count {
        let child = srs.attr_value(name, j).unwrap_or_default();
        let is_parent = level + 1 < MAX_PROJECTION_DEPTH && srs.attr_value(&child, 0).is_some();
        if is_parent {
            write_node(out, srs, &child, level + 1)?;
        } else {
            writeln!(out, "    {}{}: '{}'", spaces, j, child)?;
        }
    }
    Ok(())
}

/// Print the projection section of the `--info` report
pub fn write_projection<W, S>(out: &mut W, srs: Option<&S>) -> io::Result<()>
where
    W: Write + ?Sized,
    S: SrsAttributes + ?Sized,
{
    writeln!(out, "Projection is:")?;
    for name in PROJECTION_NODES {
        match srs {
            Some(srs) if srs.attr_value(name, 0).is_some() => write_node(out, srs, name, 0)?,
            _ => writeln!(out, "  {} (NULL)", name)?,
        }
    }
    Ok(())
}
