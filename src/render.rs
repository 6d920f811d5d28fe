use std::path::Path;

use color_eyre::eyre::{Result, WrapErr};
use plotters::coord::Shift;
use plotters::prelude::*;
use tracing::{info, warn};

use crate::network::NetworkSample;
use crate::sampler::AggregatedSample;

type SvgArea<'a> = DrawingArea<SVGBackend<'a>, Shift>;
type DrawResult<T> = std::result::Result<T, DrawingAreaErrorKind<std::io::Error>>;

struct Line {
    label: &'static str,
    color: RGBColor,
    points: Vec<(f64, f64)>,
}

impl Line {
    fn new(label: &'static str, color: RGBColor, points: impl Iterator<Item = (f64, f64)>) -> Self {
        Self {
            label,
            color,
            points: points.collect(),
        }
    }
}

/// Writes a 2x2 SVG dashboard: CPU, memory, disk I/O and network, all on a
/// shared elapsed-time axis.
pub fn render(path: &Path, resources: &[AggregatedSample], network: &[NetworkSample]) -> Result<()> {
    if path.extension().and_then(|e| e.to_str()) != Some("svg") {
        warn!(path = %path.display(), "plots are always written as SVG");
    }

    let x_max = resources
        .iter()
        .map(|s| s.elapsed_seconds)
        .chain(network.iter().map(|s| s.elapsed_seconds))
        .fold(1.0_f64, f64::max);

    let cpu = [Line::new(
        "CPU (%)",
        RED,
        resources.iter().map(|s| (s.elapsed_seconds, s.cpu_percent)),
    )];
    let memory = [
        Line::new(
            "Real (MB)",
            BLUE,
            resources.iter().map(|s| (s.elapsed_seconds, s.mem_resident_mb)),
        ),
        Line::new(
            "Virtual (MB)",
            GREEN,
            resources.iter().map(|s| (s.elapsed_seconds, s.mem_virtual_mb)),
        ),
    ];
    let io = [
        Line::new(
            "IO Read (MB)",
            BLUE,
            resources.iter().map(|s| (s.elapsed_seconds, s.io_read_mb)),
        ),
        Line::new(
            "IO Write (MB)",
            GREEN,
            resources.iter().map(|s| (s.elapsed_seconds, s.io_write_mb)),
        ),
    ];
    let net = [
        Line::new(
            "Upload (B)",
            BLUE,
            network.iter().map(|s| (s.elapsed_seconds, s.upload_bytes as f64)),
        ),
        Line::new(
            "Download (B)",
            GREEN,
            network.iter().map(|s| (s.elapsed_seconds, s.download_bytes as f64)),
        ),
    ];

    let panels = [
        ("CPU", &cpu[..]),
        ("Memory", &memory[..]),
        ("Disk I/O", &io[..]),
        ("Network", &net[..]),
    ];
    draw(path, x_max, panels).wrap_err_with(|| format!("failed to render {}", path.display()))?;

    info!(path = %path.display(), samples = resources.len(), network = network.len(), "plot written");
    Ok(())
}

fn draw(path: &Path, x_max: f64, panels: [(&str, &[Line]); 4]) -> DrawResult<()> {
    let root = SVGBackend::new(path, (1280, 960)).into_drawing_area();
    root.fill(&WHITE)?;

    let areas = root.split_evenly((2, 2));
    for (area, (title, lines)) in areas.iter().zip(panels) {
        draw_panel(area, title, x_max, lines)?;
    }

    root.present()?;
    Ok(())
}

fn draw_panel(area: &SvgArea<'_>, title: &str, x_max: f64, lines: &[Line]) -> DrawResult<()> {
    let y_peak = lines
        .iter()
        .flat_map(|l| l.points.iter().map(|p| p.1))
        .fold(0.0_f64, f64::max);
    let y_max = if y_peak > 0.0 { y_peak * 1.2 } else { 1.0 };

    let mut chart = ChartBuilder::on(area)
        .caption(title, ("sans-serif", 20))
        .margin(15)
        .x_label_area_size(30)
        .y_label_area_size(70)
        .build_cartesian_2d(0.0..x_max, 0.0..y_max)?;

    chart.configure_mesh().x_desc("time (s)").draw()?;

    for line in lines {
        let color = line.color;
        chart
            .draw_series(LineSeries::new(line.points.iter().copied(), &color))?
            .label(line.label)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }

    chart
        .configure_series_labels()
        .border_style(BLACK)
        .background_style(WHITE.mix(0.8))
        .draw()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_svg_with_every_panel() {
        let path = std::env::temp_dir().join(format!("psrecord_render_{}.svg", std::process::id()));
        let resources: Vec<AggregatedSample> = (0..5)
            .map(|i| AggregatedSample {
                elapsed_seconds: i as f64 * 0.5,
                cpu_percent: 10.0 * i as f64,
                mem_resident_mb: 20.0,
                mem_virtual_mb: 200.0,
                io_read_mb: i as f64,
                io_write_mb: 0.5,
            })
            .collect();
        let network = vec![NetworkSample {
            elapsed_seconds: 1.0,
            upload_bytes: 1200,
            download_bytes: 3400,
        }];

        render(&path, &resources, &network).unwrap();

        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.contains("<svg"));
        for title in ["CPU", "Memory", "Disk I/O", "Network"] {
            assert!(svg.contains(title), "missing panel {title}");
        }
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn empty_series_still_render() {
        let path = std::env::temp_dir().join(format!("psrecord_empty_{}.svg", std::process::id()));
        render(&path, &[], &[]).unwrap();
        assert!(path.exists());
        let _ = std::fs::remove_file(&path);
    }
}
