use iced::advanced::text::Span as RichSpan;
use iced::font::{self, Font, Weight};
use iced::widget::{
    button, column, container, horizontal_rule, rich_text, row, span, text, Column, Row, Space,
};
use iced::{alignment, Color, Element, Length};

use crate::classify::NotificationKind;
use crate::render::{Block, LinkItem, RenderedAnswer, Span};
use crate::toast::{Toast, Toasts};
use crate::Message;

const BODY_SIZE: u16 = 15;
const ACCENT: Color = Color::from_rgb(0.98, 0.57, 0.24);
const MUTED: Color = Color::from_rgb(0.55, 0.55, 0.6);
const CODE: Color = Color::from_rgb(0.62, 0.81, 0.42);

pub fn answer(rendered: &RenderedAnswer) -> Element<'_, Message> {
    let mut content = Column::with_children(rendered.blocks.iter().map(block)).spacing(12);

    if !rendered.links.is_empty() {
        content = content.push(horizontal_rule(1)).push(links(&rendered.links));
    }

    content.into()
}

fn block(block: &Block) -> Element<'_, Message> {
    match block {
        Block::Heading { level, spans } => {
            let size = 26u16.saturating_sub(u16::from(*level) * 2).max(BODY_SIZE);
            inline(spans, size, true)
        }
        Block::Paragraph(spans) => inline(spans, BODY_SIZE, false),
        Block::ListItem {
            depth,
            marker,
            quoted,
            spans,
        } => row![
            text(if *quoted { "│" } else { "" }).size(BODY_SIZE).color(MUTED),
            Space::with_width(Length::Fixed(*depth as f32 * 20.0)),
            text(marker.as_str()).size(BODY_SIZE).color(ACCENT),
            inline(spans, BODY_SIZE, false),
        ]
        .spacing(8)
        .into(),
        Block::Quote(spans) => row![
            text("│").size(BODY_SIZE).color(MUTED),
            inline(spans, BODY_SIZE, false),
        ]
        .spacing(8)
        .into(),
        Block::Code(code) => container(text(code.as_str()).size(14).font(Font::MONOSPACE).color(CODE))
            .padding(10)
            .width(Length::Fill)
            .style(container::rounded_box)
            .into(),
        Block::Table { header, rows } => {
            let mut table = Column::new().spacing(6);
            if !header.is_empty() {
                table = table.push(table_row(header, true)).push(horizontal_rule(1));
            }
            for cells in rows {
                table = table.push(table_row(cells, false));
            }
            container(table)
                .padding(10)
                .style(container::bordered_box)
                .into()
        }
        Block::Rule => horizontal_rule(1).into(),
    }
}

fn table_row(cells: &[Vec<Span>], bold: bool) -> Element<'_, Message> {
    Row::with_children(cells.iter().map(|cell| {
        container(inline(cell, BODY_SIZE, bold))
            .width(Length::FillPortion(1))
            .into()
    }))
    .spacing(12)
    .into()
}

fn inline(spans: &[Span], size: u16, bold: bool) -> Element<'_, Message> {
    let spans: Vec<RichSpan<'_, Message>> = spans.iter().map(|s| styled(s, bold)).collect();
    rich_text(spans).size(size).into()
}

fn styled(s: &Span, bold: bool) -> RichSpan<'_, Message> {
    let mut font = Font::MONOSPACE;
    if bold || s.style.strong {
        font.weight = Weight::Bold;
    }
    if s.style.emphasis {
        font.style = font::Style::Italic;
    }

    let mut out = span(s.text.as_str()).font(font);
    if s.style.code {
        out = out.color(CODE);
    }
    if s.style.strikethrough {
        out = out.color(MUTED);
    }
    if let Some(link) = &s.link {
        out = out.color(ACCENT).link(Message::OpenLink(link.clone()));
    }
    out
}

fn links(links: &[LinkItem]) -> Element<'_, Message> {
    column![
        text("Relevant Resources:").size(14).color(MUTED),
        Column::with_children(links.iter().map(link_entry)).spacing(6),
    ]
    .spacing(8)
    .into()
}

fn link_entry(link: &LinkItem) -> Element<'_, Message> {
    match &link.href {
        Some(href) => button(text(link.label.as_str()).size(14).color(ACCENT))
            .on_press(Message::OpenLink(href.clone()))
            .padding(0)
            .style(button::text)
            .into(),
        None => text(link.label.as_str()).size(14).color(MUTED).into(),
    }
}

pub fn toasts(toasts: &Toasts) -> Element<'_, Message> {
    container(Column::with_children(toasts.iter().map(toast_entry)).spacing(6))
        .width(Length::Fill)
        .align_x(alignment::Horizontal::Center)
        .into()
}

fn toast_entry(toast: &Toast) -> Element<'_, Message> {
    let message = match toast.kind {
        NotificationKind::Error => text(toast.message.as_str()).size(14).style(text::danger),
    };

    container(
        row![
            message,
            button(text("×").size(14))
                .on_press(Message::DismissToast(toast.id))
                .padding(0)
                .style(button::text),
        ]
        .spacing(12)
        .align_y(alignment::Vertical::Center),
    )
    .padding(10)
    .style(container::rounded_box)
    .into()
}
