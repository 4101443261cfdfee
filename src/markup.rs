//! HTML templates for the inline viewer.
//!
//! Class names follow the `ric-*` stylesheet shipped with the extension. User supplied
//! text (authors, bodies) is always escaped; bodies are shown literally, never as
//! markdown.

use std::fmt::Write as _;

use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};

use crate::feed::ToggleState;
use crate::format::Theme;
use crate::reddit::VoteState;
use crate::render::{CommentCard, CommentsSection};

const ICON_UPVOTE: &str = r#"<svg fill="currentColor" height="20" viewBox="0 0 20 20" width="20" xmlns="http://www.w3.org/2000/svg"><path d="M10 19a3.966 3.966 0 01-3.96-3.962V10.98H2.838a1.731 1.731 0 01-1.605-1.073 1.734 1.734 0 01.377-1.895L9.364.254a.925.925 0 011.272 0l7.754 7.759c.498.499.646 1.242.376 1.894-.27.652-.9 1.073-1.605 1.073h-3.202v4.058A3.965 3.965 0 019.999 19H10zM2.989 9.179H7.84v5.731c0 1.13.81 2.163 1.934 2.278a2.163 2.163 0 002.386-2.15V9.179h4.851L10 2.163 2.989 9.179z"/></svg>"#;
const ICON_DOWNVOTE: &str = r#"<svg fill="currentColor" height="20" viewBox="0 0 20 20" width="20" xmlns="http://www.w3.org/2000/svg"><path d="M10 1a3.966 3.966 0 013.96 3.962V9.02h3.202c.706 0 1.335.42 1.605 1.073.27.652.122 1.396-.377 1.895l-7.754 7.759a.925.925 0 01-1.272 0l-7.754-7.76a1.734 1.734 0 01-.376-1.894c.27-.652.9-1.073 1.605-1.073h3.202V4.962A3.965 3.965 0 0110 1zm7.01 9.82h-4.85V5.09c0-1.13-.81-2.163-1.934-2.278a2.163 2.163 0 00-2.386 2.15v5.859H2.989l7.01 7.016 7.012-7.016z"/></svg>"#;
const ICON_EXPAND: &str = r#"<svg fill="currentColor" height="16" viewBox="0 0 20 20" width="16"><path d="M10 2.5a7.5 7.5 0 100 15 7.5 7.5 0 000-15zM1 10a9 9 0 1118 0 9 9 0 01-18 0zm9-3a1 1 0 011 1v1h1a1 1 0 110 2h-1v1a1 1 0 11-2 0v-1H8a1 1 0 110-2h1V8a1 1 0 011-1z"/></svg>"#;
const ICON_COLLAPSE: &str = r#"<svg fill="currentColor" height="16" viewBox="0 0 20 20" width="16"><path d="M10 2.5a7.5 7.5 0 100 15 7.5 7.5 0 000-15zM1 10a9 9 0 1118 0 9 9 0 01-18 0zm5 0a1 1 0 011-1h6a1 1 0 110 2H7a1 1 0 01-1-1z"/></svg>"#;
const ICON_COMMENT: &str = r#"<svg fill="currentColor" height="16" viewBox="0 0 20 20" width="16"><path d="M10 1a9 9 0 00-9 9c0 1.9.8 3.6 1.9 5L.2 17.7c-.3.3-.2.8.1 1 .1.1.3.2.5.2H10a9 9 0 009-9 9 9 0 00-9-9zm0 16.2H6.2c-1 0-1.9.1-3 .1l-.1-.2c.8-.7 1.6-1.4 2.3-2.1l-1-1.3C3.3 12.6 2.8 11.3 2.8 10c0-4 3.2-7.2 7.2-7.2s7.2 3.2 7.2 7.2-3.2 7.2-7.2 7.2z"/></svg>"#;

pub fn toggle_html(state: ToggleState) -> String {
    let (data_state, active) = match state {
        ToggleState::Open => ("open", " ric-button-active"),
        ToggleState::Closed => ("closed", ""),
    };
    format!(
        r#"<button class="button border-md flex flex-row justify-center items-center h-xl font-semibold relative text-caption-1 button-secondary inline-flex items-center px-sm ric-button{active}" data-ric-state="{data_state}"><span class="flex items-center"><span class="flex me-[6px]">{ICON_COMMENT}</span><span>Inline</span></span></button>"#
    )
}

pub fn loading_html(theme: Theme) -> String {
    format!(
        r#"<div class="ric-container ric-loading {}"><div class="ric-spinner"></div><span>Loading comments...</span></div>"#,
        theme.class_name()
    )
}

pub fn error_html(theme: Theme) -> String {
    format!(
        r#"<div class="ric-container ric-error {}"><span>Failed to load comments</span><button class="ric-retry-btn">Retry</button></div>"#,
        theme.class_name()
    )
}

pub fn section_html(section: &CommentsSection, theme: Theme) -> String {
    let mut out = format!(r#"<div class="ric-container {}">"#, theme.class_name());
    match section {
        CommentsSection::Empty => out.push_str(r#"<div class="ric-empty">No comments yet</div>"#),
        CommentsSection::Comments {
            comments,
            permalink,
        } => {
            for card in comments {
                comment_html(card, &mut out);
            }
            let _ = write!(
                out,
                r#"<a class="ric-view-all" href="{}" target="_blank">{ICON_COMMENT} <span>View all comments on Reddit</span></a>"#,
                attr(permalink)
            );
        }
    }
    out.push_str("</div>");
    out
}

fn comment_html(card: &CommentCard, out: &mut String) {
    let profile_url = card.profile_url();
    let author = text(&card.author);
    let profile = attr(&profile_url);
    let op = if card.is_op { " ric-op" } else { "" };

    let _ = write!(
        out,
        r#"<div class="ric-comment {depth}" data-thing-id="{id}"><a class="ric-avatar" style="background: {color}" href="{profile}" target="_blank">{initial}</a><div class="ric-comment-content"><div class="ric-comment-header"><a class="ric-author{op}" href="{profile}" target="_blank">{author}</a><span class="ric-time">{age}</span></div><div class="ric-comment-body">{body}</div><div class="ric-action-row">"#,
        depth = card.depth_class(),
        id = attr(&card.thing_id),
        color = attr(card.avatar_color),
        initial = text(&card.avatar_initial),
        age = text(&card.age),
        body = text(&card.body),
    );
    votes_html(card, out);
    out.push_str("</div>");

    if let Some(group) = &card.replies {
        let (icon, display) = if group.expanded {
            (ICON_COLLAPSE, "block")
        } else {
            (ICON_EXPAND, "none")
        };
        let _ = write!(
            out,
            r#"<div class="ric-replies-wrapper"><button class="ric-toggle-thread">{icon}<span>{label}</span></button><div class="ric-replies" style="display: {display}">"#,
            label = group.label(),
            display = attr(display),
        );
        for child in &group.children {
            comment_html(child, out);
        }
        out.push_str("</div></div>");
    }

    out.push_str("</div></div>");
}

fn votes_html(card: &CommentCard, out: &mut String) {
    let state = card.votes.state();
    let up = if state == VoteState::Up { " ric-voted-up" } else { "" };
    let down = if state == VoteState::Down {
        " ric-voted-down"
    } else {
        ""
    };
    let _ = write!(
        out,
        r#"<div class="ric-votes"><button class="ric-vote-btn ric-upvote{up}">{ICON_UPVOTE}</button><span class="ric-vote-score">{score}</span><button class="ric-vote-btn ric-downvote{down}">{ICON_DOWNVOTE}</button></div>"#,
        score = card.votes.score_label(),
    );
}

/// Plain-text rendering of a section, one comment per line block, indented by depth.
pub fn outline(section: &CommentsSection) -> String {
    let mut out = String::new();
    match section {
        CommentsSection::Empty => out.push_str("No comments yet\n"),
        CommentsSection::Comments {
            comments,
            permalink,
        } => {
            for card in comments {
                outline_card(card, &mut out);
            }
            let _ = writeln!(out, "View all comments on Reddit: {permalink}");
        }
    }
    out
}

fn outline_card(card: &CommentCard, out: &mut String) {
    let indent = "  ".repeat(card.depth);
    let op = if card.is_op { " [OP]" } else { "" };
    let _ = writeln!(
        out,
        "{indent}{}{op} · {} · {} points",
        card.author,
        card.age,
        card.votes.score_label()
    );
    for line in card.body.lines() {
        let _ = writeln!(out, "{indent}  {line}");
    }
    if let Some(group) = &card.replies {
        let marker = if group.expanded { "-" } else { "+" };
        let _ = writeln!(out, "{indent}  [{marker}] {}", group.label());
        for child in &group.children {
            outline_card(child, out);
        }
    }
}
