//! Plain-text calibration report.
//!
//! Matrices are written row by row in brackets, rows separated by `;` and a
//! newline; column vectors put one element per row.

use std::fmt;
use std::fs;
use std::path::Path;

use chesscal_calib::{rodrigues, DistortionCoeffs};
use chesscal_core::{Mat3, Real, Vec3};

use crate::cache::CalibrationCache;
use crate::error::PipelineError;
use crate::pipeline::Evaluation;

fn format_rows(rows: &[Vec<Real>]) -> String {
    let body = rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        })
        .collect::<Vec<_>>()
        .join(";\n ");
    format!("[{body}]")
}

pub fn format_mat3(m: &Mat3) -> String {
    let rows: Vec<Vec<Real>> = (0..3)
        .map(|r| (0..3).map(|c| m[(r, c)]).collect())
        .collect();
    format_rows(&rows)
}

pub fn format_row_vector(values: &[Real]) -> String {
    format_rows(&[values.to_vec()])
}

pub fn format_column_vector(v: &Vec3) -> String {
    let rows: Vec<Vec<Real>> = v.iter().map(|x| vec![*x]).collect();
    format_rows(&rows)
}

/// Report contents borrowed from a solved cache.
pub struct Report<'a> {
    pub intrinsic_matrix: Mat3,
    pub dist_coeffs: DistortionCoeffs,
    pub evaluation: &'a Evaluation,
    pub rvecs: &'a [Vec3],
    pub tvecs: &'a [Vec3],
}

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Per-image mean reprojection error:")?;
        for (i, err) in self.evaluation.per_image.iter().enumerate() {
            writeln!(f, "image {} mean error: {} pixels", i + 1, err)?;
        }
        writeln!(f, "Overall mean error: {} pixels", self.evaluation.overall)?;
        writeln!(f)?;

        writeln!(f, "Camera intrinsic matrix:")?;
        writeln!(f, "{}", format_mat3(&self.intrinsic_matrix))?;
        writeln!(f)?;
        writeln!(f, "Distortion coefficients (k1, k2, p1, p2, k3):")?;
        writeln!(f, "{}", format_row_vector(&self.dist_coeffs.as_array()))?;
        writeln!(f)?;

        for (i, (rvec, tvec)) in self.rvecs.iter().zip(self.tvecs).enumerate() {
            writeln!(f, "image {} rotation vector:", i + 1)?;
            writeln!(f, "{}", format_column_vector(rvec))?;
            writeln!(f, "image {} rotation matrix:", i + 1)?;
            writeln!(f, "{}", format_mat3(&rodrigues(rvec)))?;
            writeln!(f, "image {} translation vector:", i + 1)?;
            writeln!(f, "{}", format_column_vector(tvec))?;
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Per-image errors, overall error, camera matrix, distortion, then
/// rotation vector, rotation matrix and translation per image.
pub fn render_report(cache: &CalibrationCache, evaluation: &Evaluation) -> Result<String, PipelineError> {
    let report = Report {
        intrinsic_matrix: cache.intrinsic_matrix.ok_or(PipelineError::NotCalibrated)?,
        dist_coeffs: cache.dist_coeffs.ok_or(PipelineError::NotCalibrated)?,
        evaluation,
        rvecs: &cache.rvecs_mat,
        tvecs: &cache.tvecs_mat,
    };
    Ok(report.to_string())
}

/// Write the report, creating missing parent directories.
pub fn write_report(path: &Path, text: &str) -> Result<(), PipelineError> {
    let to_err = |source| PipelineError::ReportWrite {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(&to_err)?;
    }
    fs::write(path, text).map_err(&to_err)
}
