use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use relief::{survey_point, PointSurvey, SurveyParams};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use super::open_loader;

pub fn run(
    tileset: Option<PathBuf>,
    cache_size: u64,
    input: PathBuf,
    output: Option<PathBuf>,
    reference_radius: f64,
    radii: Vec<f64>,
) -> Result<()> {
    if radii.is_empty() {
        bail!("At least one radius is required");
    }

    let loader = open_loader(tileset, cache_size)?;
    let params = SurveyParams {
        reference_radius,
        radii,
    };

    let file = File::open(&input).context("Failed to open input file")?;
    let points = parse_points(BufReader::new(file))?;

    let pb = ProgressBar::new(points.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
            )?
            .progress_chars("#>-"),
    );

    let output_path = output.unwrap_or_else(|| default_output(&input));
    let output_file = File::create(&output_path).context("Failed to create output file")?;
    let mut writer = csv::Writer::from_writer(BufWriter::new(output_file));
    writer.write_record(header(&params))?;

    let mut failed = 0usize;
    for (x, y) in points {
        match survey_point(&loader, x, y, &params) {
            Ok(survey) => writer.write_record(record(&survey))?,
            Err(e) => {
                tracing::warn!(x, y, error = %e, "Point skipped");
                failed += 1;
            }
        }
        pb.inc(1);
    }

    pb.finish_with_message("done");
    writer.flush()?;

    if failed > 0 {
        eprintln!("{} points without data were skipped", failed);
    }
    println!("Output written to: {}", output_path.display());
    Ok(())
}

/// Parse one `x y` pair per line. Commas also separate; blank lines and
/// lines starting with `#` are ignored.
fn parse_points<R: BufRead>(reader: R) -> Result<Vec<(f64, f64)>> {
    let mut points = Vec::new();

    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut fields = line
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|f| !f.is_empty());
        let (Some(x), Some(y)) = (fields.next(), fields.next()) else {
            bail!("Line {}: expected two coordinates", n + 1);
        };
        let x: f64 = x
            .parse()
            .with_context(|| format!("Line {}: invalid x coordinate", n + 1))?;
        let y: f64 = y
            .parse()
            .with_context(|| format!("Line {}: invalid y coordinate", n + 1))?;
        points.push((x, y));
    }

    Ok(points)
}

fn default_output(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "points".to_string());
    input.with_file_name(format!("{}_survey.csv", stem))
}

fn header(params: &SurveyParams) -> Vec<String> {
    let mut header: Vec<String> = ["x", "y", "ref_x", "ref_y", "ref_height"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    for radius in &params.radii {
        header.push(format!("mean_{}", radius));
        header.push(format!("min_{}", radius));
        header.push(format!("max_{}", radius));
    }
    header.push("isolation".to_string());
    header
}

fn record(survey: &PointSurvey) -> Vec<String> {
    let mut record = vec![
        survey.x.to_string(),
        survey.y.to_string(),
        survey.reference.x.to_string(),
        survey.reference.y.to_string(),
        format!("{:.2}", survey.reference.height),
    ];
    for ring in &survey.rings {
        match ring {
            Some(ring) => {
                record.push(format!("{:.2}", ring.mean));
                record.push(format!("{:.2}", ring.min));
                record.push(format!("{:.2}", ring.max));
            }
            None => record.extend(std::iter::repeat(String::new()).take(3)),
        }
    }
    record.push(
        survey
            .isolation
            .map(|iso| format!("{:.1}", iso.distance))
            .unwrap_or_default(),
    );
    record
}
