//! UI rendering for the investigation TUI

use ratatui::{
    prelude::*,
    widgets::{
        canvas::{Canvas, Line as CanvasLine, Rectangle},
        Block, Borders, Clear, Paragraph, Wrap,
    },
};

use crate::trace::{
    AgentRole, BadgeTone, GraphLayout, GraphNode, Inspector, NodeId, TraceStatus, COLUMN_COUNT,
};

use super::app::App;

/// Node boxes take this share of a grid cell
const BOX_WIDTH: f64 = 0.8;
const BOX_HEIGHT: f64 = 0.55;

/// Main draw function - header, graph, inspector, footer
pub fn draw(frame: &mut Frame, app: &App) {
    let area = frame.area();
    let graph = app.investigation.graph();

    let main_layout = Layout::vertical([
        Constraint::Length(1), // Header
        Constraint::Min(10),   // Content
        Constraint::Length(1), // Footer/status
    ])
    .split(area);

    draw_header(frame, app, &graph, main_layout[0]);

    match app.investigation.inspector() {
        Some(inspector) => {
            let content_layout =
                Layout::horizontal([Constraint::Percentage(62), Constraint::Percentage(38)])
                    .split(main_layout[1]);
            draw_graph(frame, app, &graph, content_layout[0]);
            draw_inspector(frame, &inspector, content_layout[1]);
        }
        None => draw_graph(frame, app, &graph, main_layout[1]),
    }

    draw_footer(frame, app, main_layout[2]);

    if app.show_help {
        draw_help_overlay(frame, area);
    }
}

fn draw_header(frame: &mut Frame, app: &App, graph: &GraphLayout, area: Rect) {
    let inv = &app.investigation;
    let signal = graph
        .node(NodeId::Root)
        .map(|n| n.content.clone())
        .unwrap_or_default();

    let replay = match inv.replay().total() {
        Some(total) => format!("[REPLAYING... {}/{}]", inv.visible_count(), total),
        None => "[RUN SIMULATION]".to_string(),
    };
    let replay_style = if inv.is_replaying() {
        Style::default().fg(Color::Black).bg(Color::Yellow).bold()
    } else {
        Style::default().fg(Color::Black).bg(Color::Green).bold()
    };

    let header = Line::from(vec![
        Span::raw(format!(
            " Sentinel Auditor │ {} │ {} │ {}/{} steps ",
            inv.store().investigation_id(),
            signal,
            inv.visible_count(),
            inv.store().len()
        )),
        Span::styled(replay, replay_style),
    ]);

    frame.render_widget(
        Paragraph::new(header).style(Style::default().bg(Color::Blue).fg(Color::White).bold()),
        area,
    );
}

fn draw_graph(frame: &mut Frame, app: &App, graph: &GraphLayout, area: Rect) {
    let block = Block::default()
        .title(" Agent Trace ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Magenta));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let grid = app.investigation.grid();
    let rows = graph.nodes.iter().map(|n| n.row).max().unwrap_or(0) + 1;
    let box_w = grid.column_width * BOX_WIDTH;
    let box_h = grid.row_height * BOX_HEIGHT;
    let selected = app.investigation.selected();

    let canvas = Canvas::default()
        .x_bounds([
            -grid.column_width * 0.1,
            COLUMN_COUNT as f64 * grid.column_width,
        ])
        .y_bounds([-(rows as f64) * grid.row_height, grid.row_height * 0.1])
        .paint(|ctx| {
            // Edges first (behind nodes)
            for edge in &graph.edges {
                let (Some(from), Some(to)) = (graph.node(edge.source), graph.node(edge.target))
                else {
                    continue;
                };
                let color = if edge.failed {
                    Color::Red
                } else if edge.animated {
                    Color::Yellow
                } else {
                    Color::DarkGray
                };
                ctx.draw(&CanvasLine {
                    x1: from.position.x + box_w / 2.0,
                    y1: -from.position.y - box_h / 2.0,
                    x2: to.position.x + box_w / 2.0,
                    y2: -to.position.y - box_h / 2.0,
                    color,
                });
            }

            for node in &graph.nodes {
                let top = -node.position.y;
                let color = if selected == Some(node.id) {
                    Color::LightCyan
                } else if app.focus == Some(node.id) {
                    Color::White
                } else {
                    role_color(&node.role)
                };

                ctx.draw(&Rectangle {
                    x: node.position.x,
                    y: top - box_h,
                    width: box_w,
                    height: box_h,
                    color,
                });

                ctx.print(
                    node.position.x + box_w * 0.04,
                    top - box_h * 0.3,
                    Span::styled(node.title.clone(), Style::default().fg(role_color(&node.role)).bold()),
                );
                ctx.print(
                    node.position.x + box_w * 0.04,
                    top - box_h * 0.6,
                    node_detail_line(node),
                );
            }
        });

    frame.render_widget(canvas, inner);

    if app.investigation.is_waiting() {
        let waiting_area = Rect {
            x: inner.x,
            y: inner.y + inner.height.saturating_sub(2),
            width: inner.width,
            height: 1,
        };
        let waiting = Paragraph::new("Waiting for agents...")
            .style(Style::default().fg(Color::DarkGray).italic())
            .alignment(Alignment::Center);
        frame.render_widget(waiting, waiting_area);
    }
}

/// Status, content and badge for the second line of a node box
fn node_detail_line(node: &GraphNode) -> Line<'static> {
    let mut spans = vec![
        Span::styled(
            format!("{} ", node.status),
            Style::default().fg(status_color(&node.status)),
        ),
        Span::raw(node.content.clone()),
    ];
    if let Some(badge) = &node.badge {
        spans.push(Span::raw(" "));
        spans.push(Span::styled(
            format!("[{}]", badge.text),
            Style::default().fg(Color::Black).bg(badge_color(badge.tone)).bold(),
        ));
    }
    Line::from(spans)
}

fn draw_inspector(frame: &mut Frame, inspector: &Inspector, area: Rect) {
    let block = Block::default()
        .title(" Inspector [Esc] close ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let label = Style::default().fg(Color::DarkGray);
    let mut lines = vec![
        Line::from(vec![Span::styled("Role:   ", label), Span::raw(inspector.role.clone()).bold()]),
        Line::from(vec![Span::styled("Status: ", label), Span::raw(inspector.status.clone())]),
        Line::from(vec![Span::styled("Time:   ", label), Span::raw(inspector.timestamp.clone())]),
        Line::from(""),
        Line::from(Span::styled("Output", label)),
    ];
    lines.extend(
        inspector
            .output
            .lines()
            .map(|l| Line::from(Span::styled(l.to_string(), Style::default().fg(Color::Green)))),
    );

    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn draw_footer(frame: &mut Frame, app: &App, area: Rect) {
    let text = match app.status() {
        Some(status) => format!(" {} ", status),
        None => " [r] replay  [j/k] focus  [Enter] inspect  [Esc] close  [?] help  [q] quit "
            .to_string(),
    };
    frame.render_widget(
        Paragraph::new(text).style(Style::default().fg(Color::DarkGray)),
        area,
    );
}

fn draw_help_overlay(frame: &mut Frame, area: Rect) {
    let width = 44.min(area.width);
    let height = 11.min(area.height);
    let popup = Rect {
        x: area.x + (area.width.saturating_sub(width)) / 2,
        y: area.y + (area.height.saturating_sub(height)) / 2,
        width,
        height,
    };

    let keys = [
        ("r", "replay the investigation"),
        ("j / ↓ / →", "focus next node"),
        ("k / ↑ / ←", "focus previous node"),
        ("Enter", "inspect focused node"),
        ("Esc", "close inspector"),
        ("?", "toggle this help"),
        ("q", "quit"),
    ];
    let lines: Vec<Line> = keys
        .iter()
        .map(|(key, what)| {
            Line::from(vec![
                Span::styled(format!("{:>10}  ", key), Style::default().fg(Color::Yellow)),
                Span::raw(*what),
            ])
        })
        .collect();

    frame.render_widget(Clear, popup);
    frame.render_widget(
        Paragraph::new(lines).block(
            Block::default()
                .title(" Keys ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Yellow)),
        ),
        popup,
    );
}

/// Theme colour per role; unknown roles share the trigger theme
pub fn role_color(role: &AgentRole) -> Color {
    match role {
        AgentRole::Trigger | AgentRole::Other(_) => Color::Gray,
        AgentRole::Triage => Color::Cyan,
        AgentRole::Intel => Color::Blue,
        AgentRole::Judge => Color::Yellow,
        AgentRole::Ciso => Color::Magenta,
        AgentRole::Enforcer => Color::Red,
    }
}

pub fn status_color(status: &TraceStatus) -> Color {
    match status {
        TraceStatus::Thinking => Color::Yellow,
        TraceStatus::Success | TraceStatus::Completed => Color::Green,
        TraceStatus::Failed => Color::Red,
        TraceStatus::Other(_) => Color::DarkGray,
    }
}

pub fn badge_color(tone: BadgeTone) -> Color {
    match tone {
        BadgeTone::Block | BadgeTone::Killed => Color::Red,
        BadgeTone::Allow => Color::Green,
    }
}
