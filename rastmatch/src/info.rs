use crate::options::Info;
use anyhow::Result;
use georaster::{raster_list, BilIo, RasterIo};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Serialize)]
struct RasterInfo {
    path: PathBuf,
    width: usize,
    height: usize,
    cell: [f64; 2],
    /// `[xmin, ymin, xmax, ymax]`
    extent: [f64; 4],
    projection: String,
    nodata: f32,
    valid: usize,
    min: Option<f32>,
    max: Option<f32>,
}

impl Info {
    pub fn run(&self) -> Result<()> {
        let io = BilIo::default();
        let mut infos = Vec::new();
        for path in raster_list(&self.input)? {
            let raster = io.read(&path)?;
            let rect = raster.rect();
            let range = raster.valid_range();
            infos.push(RasterInfo {
                width: raster.width(),
                height: raster.height(),
                cell: [raster.cell().width, raster.cell().height],
                extent: [rect.min().x, rect.min().y, rect.max().x, rect.max().y],
                projection: raster.projection().to_string(),
                nodata: raster.nodata(),
                valid: raster.valid().count(),
                min: range.map(|(lo, _)| lo),
                max: range.map(|(_, hi)| hi),
                path,
            });
        }

        if self.json {
            println!("{}", serde_json::to_string_pretty(&infos)?);
            return Ok(());
        }
        for info in &infos {
            println!("{}", info.path.display());
            println!("  size:       {} x {}", info.width, info.height);
            println!("  cell:       {} x {}", info.cell[0], info.cell[1]);
            println!(
                "  extent:     {}, {} .. {}, {}",
                info.extent[0], info.extent[1], info.extent[2], info.extent[3]
            );
            println!("  projection: {}", info.projection);
            println!("  nodata:     {}", info.nodata);
            match (info.min, info.max) {
                (Some(min), Some(max)) => {
                    println!("  valid:      {} ({min} .. {max})", info.valid);
                }
                _ => println!("  valid:      0"),
            }
        }
        Ok(())
    }
}
