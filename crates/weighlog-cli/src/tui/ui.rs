//! TUI rendering.
//!
//! ┌──────────────────────────────────────────────┐
//! │  weighlog   ● EXP_3   2 seconds   seconds    │
//! ├──────────────────┬───────────────────────────┤
//! │  Readings        │  Weights (kg)             │
//! │  T1   29.80 °C   │  ⠈⠑⠢⣀ W1                  │
//! │  T2   27.30 °C   │      ⠉⠒⠤⣀                 │
//! │  W1   30.1412    │  ⠤⠤⠤⠤⠤⠤⠤⠤ W2               │
//! │  W2   15.1791    │                           │
//! │  Δ    14.9621    │                           │
//! ├──────────────────┴───────────────────────────┤
//! │  Experiment EXP_3 started                    │
//! ├──────────────────────────────────────────────┤
//! │  s start  x stop  c clear  t scale  q quit   │
//! └──────────────────────────────────────────────┘

use super::app::App;
use ratatui::{prelude::*, widgets::*};
use weighlog_core::SessionState;

pub fn draw(f: &mut Frame, app: &App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // title
            Constraint::Min(10),   // main
            Constraint::Length(3), // status
            Constraint::Length(1), // keys
        ])
        .split(f.area());

    draw_title(f, rows[0], app);
    draw_main(f, rows[1], app);
    draw_status(f, rows[2], app);
    draw_keys(f, rows[3]);
}

fn draw_title(f: &mut Frame, area: Rect, app: &App) {
    let (state, scale) = match app.snapshot() {
        Some(s) => {
            let state = match (s.session.state, s.session.experiment_id) {
                (SessionState::Running, Some(id)) => Span::styled(
                    format!("● recording EXP_{id}"),
                    Style::default().bold().fg(Color::Red),
                ),
                _ => Span::styled(
                    format!("idle · next EXP_{}", s.session.next_experiment_id),
                    Style::default().fg(Color::DarkGray),
                ),
            };
            (state, s.session.time_scale.to_string())
        }
        None => (Span::raw("starting…"), String::new()),
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(Line::from(vec![
            Span::styled(" weighlog ", Style::default().bold().fg(Color::Cyan)),
            Span::raw("  "),
            state,
            Span::styled(
                format!("  every {}  scale: {scale} ", app.interval_label()),
                Style::default().fg(Color::DarkGray),
            ),
        ]));

    f.render_widget(block, area);
}

fn draw_main(f: &mut Frame, area: Rect, app: &App) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(30), Constraint::Min(20)])
        .split(area);

    draw_readings(f, cols[0], app);
    draw_chart(f, cols[1], app);
}

fn draw_readings(f: &mut Frame, area: Rect, app: &App) {
    let mut lines = Vec::new();

    match app.snapshot() {
        Some(snap) if snap.history.is_some() => {
            let latest = snap.history.as_ref().and_then(|h| h.latest.as_ref());
            let fmt = |v: Option<f64>, unit: &str| match v {
                Some(v) => format!("{v:>10.4} {unit}"),
                None => format!("{:>10} {unit}", "—"),
            };
            if let Some(r) = latest {
                lines.push(Line::from(Span::styled(
                    format!("{} (history)", r.experiment),
                    Style::default().bold().fg(Color::Yellow),
                )));
                lines.push(Line::from(""));
                lines.push(Line::from(format!("T1 {}", fmt(r.temp_1, "°C"))));
                lines.push(Line::from(format!("T2 {}", fmt(r.temp_2, "°C"))));
                lines.push(Line::from(format!("W1 {}", fmt(r.weight_1, "kg"))));
                lines.push(Line::from(format!("W2 {}", fmt(r.weight_2, "kg"))));
                lines.push(Line::from(format!("Δ  {}", fmt(r.difference, "kg"))));
            }
        }
        Some(snap) => match (&snap.session.latest, snap.session.difference) {
            (Some(s), Some(diff)) => {
                lines.push(Line::from(Span::styled(
                    s.captured_at.format("%H:%M:%S").to_string(),
                    Style::default().fg(Color::DarkGray),
                )));
                lines.push(Line::from(""));
                lines.push(Line::from(format!("T1 {:>10.2} °C", s.temp_1)));
                lines.push(Line::from(format!("T2 {:>10.2} °C", s.temp_2)));
                lines.push(Line::from(format!("W1 {:>10.4} kg", s.weight_1)));
                lines.push(Line::from(format!("W2 {:>10.4} kg", s.weight_2)));
                lines.push(Line::from(Span::styled(
                    format!("Δ  {diff:>10.4} kg"),
                    Style::default().bold(),
                )));
                if snap.session.failed_writes > 0 {
                    lines.push(Line::from(""));
                    lines.push(Line::from(Span::styled(
                        format!("{} write(s) failed", snap.session.failed_writes),
                        Style::default().fg(Color::Red),
                    )));
                }
            }
            _ => lines.push(Line::from("No readings yet")),
        },
        None => lines.push(Line::from("Waiting for engine…")),
    }

    let block = Block::default().borders(Borders::ALL).title(" Readings ");
    let p = Paragraph::new(lines).block(block);
    f.render_widget(p, area);
}

fn draw_chart(f: &mut Frame, area: Rect, app: &App) {
    let Some((series, is_history)) = app.chart_series() else {
        f.render_widget(Block::default().borders(Borders::ALL).title(" Weights "), area);
        return;
    };

    if series.points.is_empty() {
        let block = Block::default().borders(Borders::ALL).title(" Weights ");
        let p = Paragraph::new("Press s to start an experiment")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        f.render_widget(p, area);
        return;
    }

    let w1: Vec<(f64, f64)> = series.points.iter().map(|p| (p.elapsed, p.weight_1)).collect();
    let w2: Vec<(f64, f64)> = series.points.iter().map(|p| (p.elapsed, p.weight_2)).collect();

    let datasets = vec![
        Dataset::default()
            .name("W1")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Cyan))
            .data(&w1),
        Dataset::default()
            .name("W2")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Magenta))
            .data(&w2),
    ];

    let [x_min, x_max] = series.bounds.x;
    let [y_min, y_max] = series.bounds.y;
    let title = if is_history {
        " Weights (kg) · history "
    } else {
        " Weights (kg) "
    };

    let chart = Chart::new(datasets)
        .block(Block::default().borders(Borders::ALL).title(title))
        .x_axis(
            Axis::default()
                .title(series.scale.unit_label())
                .bounds([x_min, x_max])
                .labels(vec![
                    Line::from(format!("{x_min:.0}")),
                    Line::from(format!("{x_max:.0}")),
                ]),
        )
        .y_axis(Axis::default().bounds([y_min, y_max]).labels(vec![
            Line::from(format!("{y_min:.2}")),
            Line::from(format!("{y_max:.2}")),
        ]));

    f.render_widget(chart, area);
}

fn draw_status(f: &mut Frame, area: Rect, app: &App) {
    let block = Block::default().borders(Borders::ALL).title(" Status ");
    let p = Paragraph::new(app.status().unwrap_or(""))
        .style(Style::default().fg(Color::Yellow))
        .block(block);
    f.render_widget(p, area);
}

fn draw_keys(f: &mut Frame, area: Rect) {
    let bar = Paragraph::new(
        " s start   x stop   c clear   t scale   +/- interval   h today's log   q quit",
    )
    .style(Style::default().bg(Color::DarkGray).fg(Color::White));
    f.render_widget(bar, area);
}
