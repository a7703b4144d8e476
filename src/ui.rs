use crate::audio::AudioEngine;
use crate::core::{GapCore, MenuAction, Overlay, format_time};
use crate::library;
use crate::model::{Theme, opacity_percent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Gauge, List, ListItem, ListState, Paragraph, Wrap};

const APP_TITLE: &str = "G.A.P";
const APP_NAME: &str = "Gabut Audio Player";

#[derive(Clone, Copy)]
struct ThemePalette {
    bg: Color,
    panel_bg: Color,
    panel_alt_bg: Color,
    border: Color,
    text: Color,
    muted: Color,
    accent: Color,
    alert: Color,
    gauge_track: Color,
    selected_bg: Color,
    popup_bg: Color,
}

fn palette(theme: Theme, opacity: f32) -> ThemePalette {
    match theme {
        Theme::Grey => ThemePalette {
            bg: Color::Rgb(30, 30, 30),
            panel_bg: Color::Rgb(45, 45, 45),
            panel_alt_bg: Color::Rgb(40, 40, 40),
            border: Color::Rgb(74, 74, 74),
            text: Color::Rgb(240, 240, 240),
            muted: Color::Rgb(170, 170, 170),
            accent: Color::Rgb(0, 122, 204),
            alert: Color::Rgb(255, 107, 107),
            gauge_track: Color::Rgb(20, 20, 20),
            selected_bg: Color::Rgb(61, 61, 61),
            popup_bg: Color::Rgb(45, 45, 45),
        },
        Theme::Transparent => {
            // Terminals have no alpha; composite over black instead.
            let see_through = 1.0 - opacity;
            let bg = scale((26, 26, 26), opacity);
            ThemePalette {
                bg: rgb(bg),
                panel_bg: rgb(blend(bg, (255, 255, 255), 0.05 + see_through * 0.1)),
                panel_alt_bg: rgb(blend(bg, (255, 255, 255), 0.03 + see_through * 0.05)),
                border: rgb(blend(bg, (255, 255, 255), 0.15)),
                text: Color::Rgb(255, 255, 255),
                muted: Color::Rgb(190, 190, 190),
                accent: Color::Rgb(0, 212, 170),
                alert: Color::Rgb(255, 107, 107),
                gauge_track: rgb(blend(bg, (255, 255, 255), 0.2)),
                selected_bg: rgb(blend(bg, (0, 212, 170), 0.3)),
                popup_bg: rgb(blend(bg, (255, 255, 255), 0.08)),
            }
        }
    }
}

fn scale(color: (u8, u8, u8), factor: f32) -> (u8, u8, u8) {
    let channel = |value: u8| (f32::from(value) * factor.clamp(0.0, 1.0)).round() as u8;
    (channel(color.0), channel(color.1), channel(color.2))
}

fn blend(base: (u8, u8, u8), over: (u8, u8, u8), alpha: f32) -> (u8, u8, u8) {
    let alpha = alpha.clamp(0.0, 1.0);
    let channel = |b: u8, o: u8| {
        (f32::from(b) + (f32::from(o) - f32::from(b)) * alpha).round() as u8
    };
    (
        channel(base.0, over.0),
        channel(base.1, over.1),
        channel(base.2, over.2),
    )
}

fn rgb(color: (u8, u8, u8)) -> Color {
    Color::Rgb(color.0, color.1, color.2)
}

/// Screen regions, shared with mouse hit-testing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayerLayout {
    pub header: Rect,
    pub track_info: Rect,
    pub progress: Rect,
    pub controls: Rect,
    pub volume: Rect,
    pub status: Rect,
}

pub fn player_layout(area: Rect) -> PlayerLayout {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(6),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(area);

    let info_inner = vertical[1].inner(Margin {
        vertical: 1,
        horizontal: 1,
    });
    let progress = Rect {
        x: info_inner.x,
        y: info_inner
            .y
            .saturating_add(info_inner.height.saturating_sub(1)),
        width: info_inner.width,
        height: info_inner.height.min(1),
    };

    PlayerLayout {
        header: vertical[0],
        track_info: vertical[1],
        progress,
        controls: vertical[2],
        volume: vertical[3],
        status: vertical[5],
    }
}

pub fn draw(frame: &mut Frame, core: &GapCore, audio: &dyn AudioEngine) {
    let colors = palette(core.settings.theme(), core.settings.opacity());
    frame.render_widget(
        Block::default().style(Style::default().bg(colors.bg)),
        frame.area(),
    );

    let layout = player_layout(frame.area());
    draw_header(frame, layout.header, &colors);
    draw_track_info(frame, &layout, core, &colors);
    draw_controls(frame, layout.controls, audio, &colors);
    draw_volume(frame, layout.volume, core.volume_percent, &colors);

    let status = Paragraph::new(Line::from(vec![
        Span::styled(core.status_bar_text(), Style::default().fg(colors.muted)),
        Span::styled("  |  ", Style::default().fg(colors.muted)),
        Span::styled(core.status.as_str(), Style::default().fg(colors.text)),
    ]));
    frame.render_widget(status, layout.status);

    if let Some(overlay) = &core.overlay {
        draw_overlay(frame, overlay, core, &colors);
    }
}

fn draw_header(frame: &mut Frame, area: Rect, colors: &ThemePalette) {
    frame.render_widget(
        panel_block("", colors.panel_bg, colors.text, colors.border),
        area,
    );
    let inner = area.inner(Margin {
        vertical: 1,
        horizontal: 2,
    });
    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(inner);

    frame.render_widget(
        Paragraph::new(Span::styled(
            APP_TITLE,
            Style::default()
                .fg(colors.accent)
                .add_modifier(Modifier::BOLD),
        )),
        halves[0],
    );

    let key = |label: &'static str| {
        Span::styled(
            label,
            Style::default()
                .fg(colors.text)
                .add_modifier(Modifier::BOLD),
        )
    };
    let hint = |label: &'static str| Span::styled(label, Style::default().fg(colors.muted));
    let buttons = Paragraph::new(Line::from(vec![
        key("[f]"),
        hint(" Files  "),
        key("[a]"),
        hint(" About  "),
        Span::styled(
            "[q]",
            Style::default()
                .fg(colors.alert)
                .add_modifier(Modifier::BOLD),
        ),
        hint(" Close"),
    ]))
    .alignment(Alignment::Right);
    frame.render_widget(buttons, halves[1]);
}

fn draw_track_info(
    frame: &mut Frame,
    layout: &PlayerLayout,
    core: &GapCore,
    colors: &ThemePalette,
) {
    frame.render_widget(
        panel_block("Now Playing", colors.panel_bg, colors.text, colors.border),
        layout.track_info,
    );

    let inner = layout.track_info.inner(Margin {
        vertical: 1,
        horizontal: 1,
    });
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(inner);

    let title = Paragraph::new(Span::styled(
        core.progress.track_label.as_str(),
        Style::default()
            .fg(colors.text)
            .add_modifier(Modifier::BOLD),
    ))
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true });
    frame.render_widget(title, rows[0]);

    let times = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(rows[1]);
    frame.render_widget(
        Paragraph::new(Span::styled(
            format_time(core.progress.elapsed),
            Style::default().fg(colors.muted),
        )),
        times[0],
    );
    frame.render_widget(
        Paragraph::new(Span::styled(
            format_time(core.progress.total),
            Style::default().fg(colors.muted),
        ))
        .alignment(Alignment::Right),
        times[1],
    );

    let gauge = Gauge::default()
        .gauge_style(Style::default().fg(colors.accent).bg(colors.gauge_track))
        .ratio(percent_ratio(core.progress.percent))
        .label("");
    frame.render_widget(gauge, layout.progress);
}

fn draw_controls(frame: &mut Frame, area: Rect, audio: &dyn AudioEngine, colors: &ThemePalette) {
    let play_glyph = if audio.is_playing() { "||" } else { "|>" };
    let control = |glyph: &'static str| {
        Span::styled(
            glyph,
            Style::default()
                .fg(colors.text)
                .add_modifier(Modifier::BOLD),
        )
    };
    let controls = Paragraph::new(Line::from(vec![
        control("|<<"),
        Span::styled(" p    ", Style::default().fg(colors.muted)),
        Span::styled(
            format!(" {play_glyph} "),
            Style::default()
                .fg(colors.bg)
                .bg(colors.accent)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(" space    ", Style::default().fg(colors.muted)),
        Span::styled("n ", Style::default().fg(colors.muted)),
        control(">>|"),
    ]))
    .alignment(Alignment::Center)
    .block(panel_block("", colors.panel_alt_bg, colors.text, colors.border));
    frame.render_widget(controls, area);
}

fn draw_volume(frame: &mut Frame, area: Rect, volume_percent: u8, colors: &ThemePalette) {
    let gauge = Gauge::default()
        .block(panel_block(
            "Volume",
            colors.panel_alt_bg,
            colors.text,
            colors.border,
        ))
        .gauge_style(Style::default().fg(colors.accent).bg(colors.gauge_track))
        .ratio(percent_ratio(volume_percent))
        .label(Span::styled(
            format!("{volume_percent}%"),
            Style::default().fg(colors.text),
        ));
    frame.render_widget(gauge, area);
}

fn draw_overlay(frame: &mut Frame, overlay: &Overlay, core: &GapCore, colors: &ThemePalette) {
    match overlay {
        Overlay::FilesMenu { selected } => {
            let options: Vec<String> = MenuAction::ALL
                .iter()
                .map(|action| action.label().to_string())
                .collect();
            draw_list_popup(
                frame,
                "Files",
                &options,
                *selected,
                "Enter select  Esc close",
                colors,
            );
        }
        Overlay::Playlist { selected } => {
            let playing = core.playlist.queue().current_index();
            let options: Vec<String> = core
                .playlist
                .paths()
                .iter()
                .enumerate()
                .map(|(idx, path)| {
                    let marker = if Some(idx) == playing { "> " } else { "  " };
                    format!("{marker}{}", library::track_label(path))
                })
                .collect();
            draw_list_popup(
                frame,
                "Playlist",
                &options,
                *selected,
                "Enter play  Esc close",
                colors,
            );
        }
        Overlay::Opacity { percent } => {
            let popup = centered_rect(frame.area(), 50, 30);
            frame.render_widget(Clear, popup);
            let gauge = Gauge::default()
                .block(panel_block(
                    "Set Opacity",
                    colors.popup_bg,
                    colors.text,
                    colors.border,
                ))
                .gauge_style(Style::default().fg(colors.accent).bg(colors.gauge_track))
                .ratio(slider_ratio(*percent))
                .label(Span::styled(
                    format!("Opacity: {percent}%  (Left/Right adjust, Enter apply)"),
                    Style::default().fg(colors.text),
                ));
            frame.render_widget(gauge, popup);
        }
        Overlay::FolderPrompt { input } => {
            let popup = centered_rect(frame.area(), 70, 20);
            frame.render_widget(Clear, popup);
            let prompt = Paragraph::new(vec![
                Line::from(Span::styled(
                    format!("{input}_"),
                    Style::default().fg(colors.text),
                )),
                Line::from(Span::styled(
                    "Enter scan  Esc cancel",
                    Style::default().fg(colors.muted),
                )),
            ])
            .block(panel_block(
                "Open Folder",
                colors.popup_bg,
                colors.text,
                colors.border,
            ));
            frame.render_widget(prompt, popup);
        }
        Overlay::About => {
            let lines = vec![
                Line::from(Span::styled(
                    APP_NAME,
                    Style::default()
                        .fg(colors.accent)
                        .add_modifier(Modifier::BOLD),
                )),
                Line::from(Span::styled(
                    format!("Version {}", env!("CARGO_PKG_VERSION")),
                    Style::default().fg(colors.text),
                )),
                Line::from(Span::styled(
                    "A simple audio player.",
                    Style::default().fg(colors.text),
                )),
                Line::from(Span::styled(
                    format!("License: {}", env!("CARGO_PKG_LICENSE")),
                    Style::default().fg(colors.muted),
                )),
                Line::from(Span::styled(
                    format!(
                        "Theme: {} ({}% opacity)",
                        core.settings.theme().label(),
                        opacity_percent(core.settings.opacity())
                    ),
                    Style::default().fg(colors.muted),
                )),
            ];
            draw_message_popup(frame, "About", lines, colors);
        }
        Overlay::Warning(message) => {
            let lines = vec![
                Line::from(Span::styled(
                    message.as_str(),
                    Style::default()
                        .fg(colors.alert)
                        .add_modifier(Modifier::BOLD),
                )),
                Line::from(Span::styled(
                    "Press f, then Open Folder.",
                    Style::default().fg(colors.muted),
                )),
            ];
            draw_message_popup(frame, "Warning", lines, colors);
        }
    }
}

fn draw_list_popup(
    frame: &mut Frame,
    title: &str,
    options: &[String],
    selected: usize,
    hint: &str,
    colors: &ThemePalette,
) {
    let popup = centered_rect(frame.area(), 62, 58);
    frame.render_widget(Clear, popup);

    let items: Vec<ListItem> = options
        .iter()
        .map(|item| ListItem::new(Span::styled(item, Style::default().fg(colors.text))))
        .collect();

    let mut state = ListState::default();
    if !options.is_empty() {
        state.select(Some(selected.min(options.len() - 1)));
    }

    let list = List::new(items)
        .block(panel_block(title, colors.popup_bg, colors.text, colors.border))
        .highlight_style(
            Style::default()
                .bg(colors.selected_bg)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("-> ");
    frame.render_stateful_widget(list, popup, &mut state);

    let hint_area = Rect {
        x: popup.x.saturating_add(2),
        y: popup.y.saturating_add(popup.height.saturating_sub(1)),
        width: popup.width.saturating_sub(4),
        height: 1,
    };
    frame.render_widget(
        Paragraph::new(Span::styled(hint, Style::default().fg(colors.muted))),
        hint_area,
    );
}

fn draw_message_popup(frame: &mut Frame, title: &str, lines: Vec<Line>, colors: &ThemePalette) {
    let popup = centered_rect(frame.area(), 60, 40);
    frame.render_widget(Clear, popup);
    let mut lines = lines;
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Enter/Esc close",
        Style::default().fg(colors.muted),
    )));
    let body = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(panel_block(title, colors.popup_bg, colors.text, colors.border));
    frame.render_widget(body, popup);
}

fn panel_block(title: &str, bg: Color, text: Color, border: Color) -> Block<'_> {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .style(Style::default().bg(bg));
    if title.is_empty() {
        return block;
    }
    block.title(Span::styled(
        format!(" {title} "),
        Style::default().fg(text).add_modifier(Modifier::BOLD),
    ))
}

fn centered_rect(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}

fn percent_ratio(percent: u8) -> f64 {
    (f64::from(percent) / 100.0).clamp(0.0, 1.0)
}

// The opacity slider spans 40..=100.
fn slider_ratio(percent: u8) -> f64 {
    (f64::from(percent.saturating_sub(40)) / 60.0).clamp(0.0, 1.0)
}

/// Percent of `area` width at column `x`, for click-to-seek.
pub fn column_percent(area: Rect, x: u16) -> Option<u8> {
    if area.width == 0 || x < area.x || x >= area.x.saturating_add(area.width) {
        return None;
    }
    let offset = f64::from(x - area.x);
    let span = f64::from(area.width.saturating_sub(1).max(1));
    Some(((offset / span) * 100.0).round().clamp(0.0, 100.0) as u8)
}

pub fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    if rect.width == 0 || rect.height == 0 {
        return false;
    }
    x >= rect.x
        && x < rect.x.saturating_add(rect.width)
        && y >= rect.y
        && y < rect.y.saturating_add(rect.height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transparent_background_fades_with_opacity() {
        let opaque = palette(Theme::Transparent, 1.0);
        assert_eq!(opaque.bg, Color::Rgb(26, 26, 26));

        let faint = palette(Theme::Transparent, 0.4);
        assert_eq!(faint.bg, Color::Rgb(10, 10, 10));
    }

    #[test]
    fn click_columns_map_to_percent() {
        let area = Rect::new(10, 5, 101, 1);
        assert_eq!(column_percent(area, 10), Some(0));
        assert_eq!(column_percent(area, 60), Some(50));
        assert_eq!(column_percent(area, 110), Some(100));
        assert_eq!(column_percent(area, 9), None);
        assert_eq!(column_percent(area, 111), None);
    }

    #[test]
    fn progress_row_sits_inside_track_panel() {
        let layout = player_layout(Rect::new(0, 0, 60, 24));
        assert_eq!(layout.progress.height, 1);
        assert!(point_in_rect(
            layout.progress.x,
            layout.progress.y,
            layout.track_info
        ));
        assert_eq!(layout.status.y, 23);
    }
}
