use iced::{
    mouse, time,
    widget::{
        button,
        canvas::{self, Canvas, Frame, Geometry, Path, Stroke},
        column, row, scrollable, text, Column, Container,
    },
    Alignment, Color, Element, Length, Point, Rectangle, Renderer, Size, Subscription, Task, Theme,
};
use std::{path::PathBuf, time::Duration};
use uscore::display::{BModeView, FrameImage, Scene};

/// Largest number of image cells drawn along either axis.
const MAX_CELLS: usize = 160;

fn main() -> iced::Result {
    iced::application(Visualizer::boot, Visualizer::update, Visualizer::view)
        .title(application_title)
        .subscription(application_subscription)
        .theme(application_theme)
        .run()
}

fn application_title(state: &Visualizer) -> String {
    match &state.scene {
        Some(scene) => format!("Ultrasound scene viewer: {}", scene.title),
        None => "Ultrasound scene viewer".into(),
    }
}

fn application_subscription(state: &Visualizer) -> Subscription<Message> {
    if state.follow {
        time::every(Duration::from_secs(2)).map(|_| Message::Reload)
    } else {
        Subscription::none()
    }
}

fn application_theme(_: &Visualizer) -> Theme {
    Theme::Dark
}

#[derive(Debug)]
struct Visualizer {
    path: Option<PathBuf>,
    scene: Option<Scene>,
    follow: bool,
    status: String,
    history: Vec<String>,
}

#[derive(Debug, Clone)]
enum Message {
    Reload,
    ToggleFollow,
    Loaded(Result<Scene, String>),
}

impl Visualizer {
    fn boot() -> (Self, Task<Message>) {
        let path = std::env::args().nth(1).map(PathBuf::from);
        let state = Visualizer {
            path: path.clone(),
            scene: None,
            follow: false,
            status: match &path {
                Some(path) => format!("Loading {}...", path.display()),
                None => "usage: visualizer <scene.json>".into(),
            },
            history: Vec::new(),
        };
        let task = match path {
            Some(path) => Task::perform(load_scene(path), Message::Loaded),
            None => Task::none(),
        };
        (state, task)
    }

    fn update(state: &mut Self, message: Message) -> Task<Message> {
        match message {
            Message::Reload => match state.path.clone() {
                Some(path) => Task::perform(load_scene(path), Message::Loaded),
                None => Task::none(),
            },
            Message::ToggleFollow => {
                state.follow = !state.follow;
                Task::none()
            }
            Message::Loaded(Ok(scene)) => {
                let summary = format!("Loaded '{}'", scene.title);
                if state.scene.as_ref() != Some(&scene) {
                    state.push_history(summary.clone());
                }
                state.status = summary;
                state.scene = Some(scene);
                Task::none()
            }
            Message::Loaded(Err(err)) => {
                state.status = format!("Scene error: {err}");
                Task::none()
            }
        }
    }

    fn view(state: &Self) -> Element<'_, Message> {
        let controls = column![
            text("Scene").size(26),
            text(
                state
                    .path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "no file".into())
            )
            .size(12),
            button("Reload").on_press(Message::Reload).padding(10),
            button(if state.follow { "Stop following" } else { "Follow file" })
                .on_press(Message::ToggleFollow)
                .padding(10),
            text(&state.status).size(14),
            text("Activity log").size(16),
            Container::new(scrollable(history_list(&state.history)).height(Length::Fixed(160.0)))
                .padding(6),
        ]
        .spacing(10)
        .padding(16)
        .width(Length::Fixed(300.0));

        let panels = match &state.scene {
            Some(scene) => scene_panels(scene),
            None => Column::new().push(text("Nothing to show yet").size(18)),
        };

        let layout = row![
            controls,
            scrollable(panels.spacing(10).padding(16).width(Length::Fill))
        ]
        .spacing(20)
        .align_y(Alignment::Start)
        .padding(20);

        Container::new(layout)
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }

    fn push_history(&mut self, entry: String) {
        self.history.push(entry);
        if self.history.len() > 20 {
            self.history.remove(0);
        }
    }
}

fn history_list(history: &[String]) -> Column<'_, Message> {
    if history.is_empty() {
        Column::new().push(text("No activity yet").size(12))
    } else {
        history
            .iter()
            .rev()
            .fold(Column::new().spacing(4), |col, entry| {
                col.push(text(entry.clone()).size(12))
            })
    }
}

fn scene_panels(scene: &Scene) -> Column<'_, Message> {
    let mut panels = Column::new().push(text(&scene.title).size(26));

    if let Some(line) = &scene.line {
        let mut series = vec![
            Series::new(&line.raw, Color::from_rgb(0.45, 0.45, 0.5)),
            Series::new(&line.envelope, Color::from_rgb(0.18, 0.72, 0.89)),
        ];
        if !line.expected.is_empty() {
            series.push(Series::new(&line.expected, Color::from_rgb(0.95, 0.55, 0.2)));
        }
        if !line.lower.is_empty() {
            series.push(Series::new(&line.lower, Color::from_rgb(0.4, 0.85, 0.4)));
        }
        panels = panels
            .push(text(format!("Raw signal and detected envelope ({})", line.method)).size(18))
            .push(plot(Traces { series }, 260.0));
    }

    if let Some(a_scan) = &scene.a_scan {
        let depth = match (a_scan.depth_mm.first(), a_scan.depth_mm.last()) {
            (Some(first), Some(last)) => format!("depth {:.2} to {:.2} mm", first, last),
            _ => "empty".into(),
        };
        panels = panels
            .push(text(format!("RF scan line, {}", depth)).size(18))
            .push(plot(
                Traces {
                    series: vec![Series::new(&a_scan.samples, Color::from_rgb(0.8, 0.8, 0.85))],
                },
                180.0,
            ));
    }

    if let Some(spectrum) = &scene.spectrum {
        let power_db: Vec<f64> = spectrum
            .power
            .iter()
            .map(|p| 10.0 * (p + f64::MIN_POSITIVE).log10())
            .collect();
        let peak = spectrum
            .peak_frequency()
            .map(|f| format!("peak at {:.1} Hz", f.abs()))
            .unwrap_or_default();
        panels = panels
            .push(text(format!("Spectrum before low-pass (dB), {}", peak)).size(18))
            .push(plot(
                Traces {
                    series: vec![Series::new(&power_db, Color::from_rgb(0.75, 0.45, 0.9))],
                },
                180.0,
            ));
    }

    if let Some(bmode) = &scene.bmode {
        panels = panels
            .push(
                text(format!(
                    "B-mode, {} scan lines, colour limits [{}, {}]",
                    bmode.scan_lines(),
                    bmode.clim[0],
                    bmode.clim[1]
                ))
                .size(18),
            )
            .push(plot(ImagePlot::from_bmode(bmode), 360.0));
    }

    if let Some(contrast) = &scene.contrast {
        if let Some(frame) = &contrast.frame {
            panels = panels
                .push(
                    text(format!(
                        "Beamforming for {} plane waves",
                        frame.plane_waves.round()
                    ))
                    .size(18),
                )
                .push(plot(ImagePlot::from_frame(frame), 420.0));
        }
        let table = contrast.rows.iter().fold(
            Column::new()
                .spacing(4)
                .push(text("plane waves | CNR per target (dB) | mean").size(14)),
            |col, row| {
                let scores: Vec<String> = row
                    .scores
                    .iter()
                    .map(|s| s.map_or_else(|| "nan".into(), |v| format!("{:.1}", v)))
                    .collect();
                let mean = row
                    .mean
                    .map_or_else(|| "nan".into(), |v| format!("{:.2}", v));
                col.push(
                    text(format!(
                        "{} | {} | {}",
                        row.plane_waves.round(),
                        scores.join("  "),
                        mean
                    ))
                    .size(14),
                )
            },
        );
        panels = panels
            .push(text("Mean image contrast").size(18))
            .push(Container::new(table).padding(6));
    }

    panels
}

fn plot<'a, P>(program: P, height: f32) -> Element<'a, Message>
where
    P: canvas::Program<Message> + 'a,
{
    Canvas::new(program)
        .width(Length::Fill)
        .height(Length::Fixed(height))
        .into()
}

async fn load_scene(path: PathBuf) -> Result<Scene, String> {
    let contents = tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| format!("{}: {}", path.display(), e))?;
    serde_json::from_str::<Scene>(&contents).map_err(|e| e.to_string())
}

struct Series {
    data: Vec<f32>,
    color: Color,
}

impl Series {
    fn new(values: &[f64], color: Color) -> Self {
        Self {
            data: values.iter().map(|&v| v as f32).collect(),
            color,
        }
    }
}

/// Line plot of several series sharing one vertical scale.
struct Traces {
    series: Vec<Series>,
}

impl canvas::Program<Message> for Traces {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        let mut frame = Frame::new(renderer, bounds.size());
        frame.fill_rectangle(
            Point::ORIGIN,
            bounds.size(),
            Color::from_rgb(0.05, 0.05, 0.05),
        );

        let finite = || {
            self.series
                .iter()
                .flat_map(|s| s.data.iter().copied())
                .filter(|v| v.is_finite())
        };
        let min = finite().fold(f32::INFINITY, f32::min);
        let max = finite().fold(f32::NEG_INFINITY, f32::max);
        if !min.is_finite() || !max.is_finite() {
            return vec![frame.into_geometry()];
        }
        let range = (max - min).max(f32::EPSILON);

        for series in self.series.iter().filter(|s| s.data.len() > 1) {
            let step = bounds.width / (series.data.len() as f32 - 1.0);
            let path = Path::new(|builder| {
                let mut pen_down = false;
                for (i, value) in series.data.iter().enumerate() {
                    if !value.is_finite() {
                        pen_down = false;
                        continue;
                    }
                    let x = i as f32 * step;
                    let y = bounds.height - (value - min) / range * bounds.height;
                    if pen_down {
                        builder.line_to(Point::new(x, y));
                    } else {
                        builder.move_to(Point::new(x, y));
                        pen_down = true;
                    }
                }
            });
            frame.stroke(
                &path,
                Stroke::default().with_width(1.5).with_color(series.color),
            );
        }

        vec![frame.into_geometry()]
    }
}

/// Grey-scale image, block-averaged down to at most [`MAX_CELLS`] per side.
struct ImagePlot {
    cells: Vec<f32>,
    rows: usize,
    cols: usize,
    clim: [f32; 2],
    /// Circles as `(x, z, radius)` in the units of `extent`.
    circles: Vec<(f32, f32, f32, Color)>,
    extent: Option<([f32; 2], [f32; 2])>,
}

impl ImagePlot {
    fn new(image: &ndarray::Array2<f64>, clim: [f64; 2]) -> Self {
        let (rows, cols) = image.dim();
        let row_step = rows.div_ceil(MAX_CELLS).max(1);
        let col_step = cols.div_ceil(MAX_CELLS).max(1);
        let out_rows = rows.div_ceil(row_step);
        let out_cols = cols.div_ceil(col_step);

        let mut cells = Vec::with_capacity(out_rows * out_cols);
        for r in 0..out_rows {
            for c in 0..out_cols {
                let block = image.slice(ndarray::s![
                    r * row_step..((r + 1) * row_step).min(rows),
                    c * col_step..((c + 1) * col_step).min(cols)
                ]);
                cells.push(block.mean().unwrap_or(0.0) as f32);
            }
        }
        Self {
            cells,
            rows: out_rows,
            cols: out_cols,
            clim: [clim[0] as f32, clim[1] as f32],
            circles: Vec::new(),
            extent: None,
        }
    }

    fn from_bmode(view: &BModeView) -> Self {
        Self::new(&view.image, view.clim)
    }

    fn from_frame(image: &FrameImage) -> Self {
        let mut plot = Self::new(&image.bmode, [-image.dynamic_range_db, 0.0]);
        plot.extent = Some((
            [image.x_extent_mm[0] as f32, image.x_extent_mm[1] as f32],
            [image.z_extent_mm[0] as f32, image.z_extent_mm[1] as f32],
        ));
        for target in &image.targets {
            let (x, z) = (target.center_x * 1e3, target.center_z * 1e3);
            for (radius, color) in [
                (target.radius, Color::from_rgb(0.95, 0.9, 0.2)),
                (target.inner_radius, Color::from_rgb(0.9, 0.2, 0.2)),
                (target.outer_radius_near, Color::from_rgb(0.2, 0.8, 0.3)),
                (target.outer_radius_far, Color::from_rgb(0.2, 0.8, 0.3)),
            ] {
                plot.circles
                    .push((x as f32, z as f32, (radius * 1e3) as f32, color));
            }
        }
        plot
    }

    fn shade(&self, value: f32) -> Color {
        let span = (self.clim[1] - self.clim[0]).max(f32::EPSILON);
        let level = if value.is_finite() {
            ((value - self.clim[0]) / span).clamp(0.0, 1.0)
        } else {
            0.0
        };
        Color::from_rgb(level, level, level)
    }
}

impl canvas::Program<Message> for ImagePlot {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        let mut frame = Frame::new(renderer, bounds.size());
        frame.fill_rectangle(Point::ORIGIN, bounds.size(), Color::BLACK);
        if self.rows == 0 || self.cols == 0 {
            return vec![frame.into_geometry()];
        }

        let cell = Size::new(
            bounds.width / self.cols as f32,
            bounds.height / self.rows as f32,
        );
        for (index, value) in self.cells.iter().enumerate() {
            let (r, c) = (index / self.cols, index % self.cols);
            frame.fill_rectangle(
                Point::new(c as f32 * cell.width, r as f32 * cell.height),
                Size::new(cell.width + 0.5, cell.height + 0.5),
                self.shade(*value),
            );
        }

        if let Some((x_extent, z_extent)) = self.extent {
            let sx = bounds.width / (x_extent[1] - x_extent[0]).max(f32::EPSILON);
            let sz = bounds.height / (z_extent[1] - z_extent[0]).max(f32::EPSILON);
            for &(x, z, radius, color) in &self.circles {
                let centre = Point::new((x - x_extent[0]) * sx, (z - z_extent[0]) * sz);
                let ellipse = Path::new(|builder| {
                    for step in 0..=48 {
                        let angle = step as f32 / 48.0 * std::f32::consts::TAU;
                        let point = Point::new(
                            centre.x + radius * sx * angle.cos(),
                            centre.y + radius * sz * angle.sin(),
                        );
                        if step == 0 {
                            builder.move_to(point);
                        } else {
                            builder.line_to(point);
                        }
                    }
                });
                frame.stroke(&ellipse, Stroke::default().with_width(1.5).with_color(color));
            }
        }

        vec![frame.into_geometry()]
    }
}
