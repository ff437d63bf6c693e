//! Turn the z-stack of one image into a movie: every kept plane is rendered, optionally labelled
//! per channel, written as a numbered JPEG, and the sequence is handed to ffmpeg.

use std::collections::BTreeSet;
use std::ffi::OsString;
use std::fs::{self, DirBuilder};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::str::FromStr;

use crate::connection::ConnectionManager;
use crate::error::{Error, Result};
use crate::font::{draw_text, text_size};
use crate::gateway::{Connector, Gateway, ImageInfo};
use crate::table::read_table;

///Distance of labels from the image edge and from each other, in pixels
pub const OFFSET: i32 = 10;
pub const DEFAULT_TMP: &str = "/tmp/";

///Corner the channel labels are stacked in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Placement {
    #[default]
    TopLeft,
    BottomLeft,
    BottomRight,
    TopRight,
}

impl FromStr for Placement {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "tl" => Ok(Placement::TopLeft),
            "bl" => Ok(Placement::BottomLeft),
            "br" => Ok(Placement::BottomRight),
            "tr" => Ok(Placement::TopRight),
            _ => Err(Error::Precondition(
                "Placement must be one of: tl, bl, br, tr".to_string(),
            )),
        }
    }
}

///Baseline-left origin for the label of channel `index`, given the image and text sizes.
///Labels stack away from the chosen corner.
pub fn label_origin(
    placement: Placement,
    index: usize,
    image: (u32, u32),
    text: (u32, u32),
) -> (i32, i32) {
    let (w, h) = (image.0 as i32, image.1 as i32);
    let (tw, th) = (text.0 as i32, text.1 as i32);
    let i = index as i32;
    let top = (i + 1) * OFFSET + (i + 1) * th;
    let bottom = h - (i + 1) * OFFSET - i * th;
    let left = OFFSET;
    let right = w - tw - OFFSET;
    match placement {
        Placement::TopLeft => (left, top),
        Placement::BottomLeft => (left, bottom),
        Placement::BottomRight => (right, bottom),
        Placement::TopRight => (right, top),
    }
}

///Options of one movie run
#[derive(Debug, Clone, clap::Args)]
pub struct MovieOptions {
    ///Image ID
    pub image: i64,

    ///Output directory (must exist)
    pub output: PathBuf,

    ///Decorate frames with labels from a CSV file. The header names the image channels, each
    ///following row holds the labels of one kept cycle in channel order.
    #[arg(short, long)]
    pub labels: Option<PathBuf>,

    ///Channel label location (tl, bl, br, tr)
    #[arg(short, long)]
    pub placement: Option<String>,

    ///Relative font size
    #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub font_size: u32,

    ///Seconds per cycle
    #[arg(short, long, default_value_t = 1.0)]
    pub duration: f64,

    ///Ignore cycles, e.g. 0,1 (no spaces). The first cycle is zero, not one
    #[arg(short, long)]
    pub ignore: Option<String>,

    ///Temporary directory
    #[arg(long, default_value = DEFAULT_TMP)]
    pub tmp: PathBuf,

    ///Encoder program
    #[arg(long, default_value = "ffmpeg")]
    pub ffmpeg: String,
}

///The external video encoder
#[derive(Debug, Clone)]
pub struct Encoder {
    pub program: String,
}

impl Encoder {
    ///Make sure the encoder can be started at all
    pub fn check(&self) -> Result<()> {
        Command::new(&self.program)
            .arg("-h")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|_| ())
            .map_err(|source| Error::EncoderMissing {
                program: self.program.clone(),
                source,
            })
    }

    ///Arguments encoding `img_%d.jpg` in `frames` at `1/duration` frames per second
    pub fn args(&self, frames: &Path, duration: f64, video: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-framerate".into(), (1.0 / duration).to_string().into()];
        args.push("-y".into());
        args.push("-i".into());
        args.push(frames.join("img_%d.jpg").into_os_string());
        for a in ["-vcodec", "libx264", "-crf", "25", "-pix_fmt", "yuv420p", "-r", "60"] {
            args.push(a.into());
        }
        args.push(video.as_os_str().to_owned());
        args
    }

    ///Run the encoder to completion. Frames are left in place on failure.
    pub fn encode(&self, frames: &Path, duration: f64, video: &Path) -> Result<()> {
        let args = self.args(frames, duration, video);
        log::debug!("running {} {:?}", self.program, args);
        let status = Command::new(&self.program)
            .args(&args)
            .status()
            .map_err(|e| Error::EncoderFailed {
                status: e.to_string(),
                frames: frames.to_path_buf(),
            })?;
        if !status.success() {
            return Err(Error::EncoderFailed {
                status: status.to_string(),
                frames: frames.to_path_buf(),
            });
        }
        Ok(())
    }
}

///Replace a leading `~` with the home directory
pub fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match home::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

///Checks that need nothing but the options themselves
pub fn check_options(opts: &MovieOptions) -> Result<Placement> {
    let placement = match &opts.placement {
        Some(_) if opts.labels.is_none() => {
            return Err(Error::Precondition(
                "Placement requires a labels file to be specified".to_string(),
            ))
        }
        Some(p) => p.parse()?,
        None => Placement::default(),
    };
    if !(opts.duration > 0.0 && opts.duration.is_finite()) {
        return Err(Error::Precondition(format!(
            "Duration must be a positive number of seconds, got {}",
            opts.duration
        )));
    }
    Ok(placement)
}

///Whether this process can create files in `dir`, found out by creating one
fn writable_dir(dir: &Path) -> bool {
    dir.is_dir() && tempfile::tempfile_in(dir).is_ok()
}

///The temporary directory must be a writable directory, the output directory must exist.
///Returns the output directory with `~` expanded.
pub fn check_directories(tmp: &Path, output: &Path) -> Result<PathBuf> {
    if !writable_dir(tmp) {
        return Err(Error::Precondition(format!(
            "Temporary directory {} must exist, be a directory and be writeable",
            tmp.display()
        )));
    }
    let output = expand_home(output);
    if !output.is_dir() {
        return Err(Error::Precondition(format!(
            "Output directory {} must exist",
            output.display()
        )));
    }
    Ok(output)
}

///Parse a comma separated list of zero based cycles, each below `size_z`
pub fn parse_ignored(list: &str, size_z: u32) -> Result<BTreeSet<u32>> {
    let mut ignored = BTreeSet::new();
    for item in list.split(',') {
        let c: i64 = item
            .trim()
            .parse()
            .map_err(|_| Error::Precondition("Ignored cycles must be integers".to_string()))?;
        if c < 0 || c >= size_z as i64 {
            return Err(Error::Precondition(format!(
                "Ignored cycle ({c}) beyond number of z-stacks in the image ({size_z})"
            )));
        }
        ignored.insert(c as u32);
    }
    Ok(ignored)
}

///Read the labels file and arrange it as one label per channel (in image channel order) for
///every kept cycle
pub fn load_labels(path: &Path, image: &ImageInfo, kept: usize) -> Result<Vec<Vec<String>>> {
    let table = read_table(path)?;
    if table.rows.len() != kept {
        return Err(Error::Precondition(format!(
            "Number of rows (1-per-cycle) in the CSV labels file ({}) must equal the number of \
             z-stacks in the image ({kept}) after excluding ignored cycles",
            table.rows.len()
        )));
    }
    if table.header.len() != image.channels.len() {
        return Err(Error::Precondition(format!(
            "Number of columns (1-per-channel) in the CSV labels file ({}) must equal the number \
             of channels in the image ({})",
            table.header.len(),
            image.channels.len()
        )));
    }
    let columns = image
        .channels
        .iter()
        .map(|c| {
            table.column(&c.label).ok_or_else(|| {
                Error::Precondition(format!(
                    "Channel {:?} has no column in the CSV labels file",
                    c.label
                ))
            })
        })
        .collect::<Result<Vec<usize>>>()?;
    Ok(table
        .rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|&j| row.get(j).cloned().unwrap_or_default())
                .collect()
        })
        .collect())
}

///Everything needed to produce the frames of one image
#[derive(Debug, Clone)]
pub struct FramePlan {
    pub image: ImageInfo,
    pub ignored: BTreeSet<u32>,
    ///per kept cycle, per channel
    pub labels: Option<Vec<Vec<String>>>,
    pub placement: Placement,
    pub font_size: u32,
}

impl FramePlan {
    ///Planes that become frames, in z order
    pub fn kept(&self) -> Vec<u32> {
        (0..self.image.size_z)
            .filter(|z| !self.ignored.contains(z))
            .collect()
    }
}

///Render, label and write one JPEG per kept plane as `img_0.jpg`, `img_1.jpg`, ...
pub fn render_frames<G: Gateway>(gateway: &G, plan: &FramePlan, dir: &Path) -> Result<Vec<PathBuf>> {
    let mut frames = Vec::new();
    for (n, z) in plan.kept().into_iter().enumerate() {
        let mut plane = gateway.render_plane(plan.image.id, z, 0)?.into_rgb8();
        if let Some(labels) = &plan.labels {
            let dims = plane.dimensions();
            for (i, (label, channel)) in labels[n].iter().zip(&plan.image.channels).enumerate() {
                let size = text_size(label, plan.font_size);
                let origin = label_origin(plan.placement, i, dims, size);
                draw_text(&mut plane, origin, label, plan.font_size, channel.color);
            }
        }
        let path = dir.join(format!("img_{n}.jpg"));
        plane.save(&path)?;
        log::debug!("wrote plane {z} as {}", path.display());
        frames.push(path);
    }
    Ok(frames)
}

///Create `<tmp>/zmovie/<uuid>`. An existing directory of that name is refused.
pub fn create_project_dir(tmp: &Path) -> Result<PathBuf> {
    let parent = tmp.join("zmovie");
    fs::create_dir_all(&parent)?;
    let project = parent.join(uuid::Uuid::new_v4().to_string());
    match DirBuilder::new().create(&project) {
        Ok(()) => Ok(project),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Err(Error::Precondition(
            format!("Project directory {} exists. Failing for safety", project.display()),
        )),
        Err(e) => Err(e.into()),
    }
}

///The whole pipeline. Returns the path of the written movie.
pub fn make_movie<C: Connector>(
    manager: &mut ConnectionManager<C>,
    opts: &MovieOptions,
) -> Result<PathBuf> {
    let placement = check_options(opts)?;
    let encoder = Encoder {
        program: opts.ffmpeg.clone(),
    };
    encoder.check()?;
    let output = check_directories(&opts.tmp, &opts.output)?;

    let image = manager.image(opts.image)?.ok_or(Error::ImageNotFound(opts.image))?;
    let ignored = match &opts.ignore {
        Some(list) => parse_ignored(list, image.size_z)?,
        None => BTreeSet::new(),
    };
    let kept = (image.size_z as usize) - ignored.len();
    let labels = match &opts.labels {
        Some(path) => Some(load_labels(path, &image, kept)?),
        None => None,
    };
    let plan = FramePlan {
        image,
        ignored,
        labels,
        placement,
        font_size: opts.font_size,
    };

    let project = create_project_dir(&opts.tmp)?;
    log::info!("writing frames to {}", project.display());
    let frames = render_frames(&*manager.connect()?, &plan, &project)?;
    log::info!("encoding {} frames", frames.len());

    let video = output.join(format!("{}.mp4", opts.image));
    encoder.encode(&project, opts.duration, &video)?;
    fs::remove_dir_all(&project)?;
    Ok(video)
}
