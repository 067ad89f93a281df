/// Reusable UI components

use yew::prelude::*;
use crate::settings::StatusLine;

#[derive(Properties, PartialEq)]
pub struct StatusBannerProps {
    pub line: StatusLine,
}

/// Last sync summary; green once something has been synced
#[function_component(StatusBanner)]
pub fn status_banner(props: &StatusBannerProps) -> Html {
    let (bg_color, border_color) = if props.line.synced {
        ("#e8f5e9", "#4caf50")
    } else {
        ("#fff3e0", "#ff9800")
    };

    html! {
        <div
            class="status-line"
            style={format!("background-color: {}; border-left: 4px solid {}; padding: 8px 12px; margin-bottom: 12px; border-radius: 4px; font-size: 13px;", bg_color, border_color)}
        >
            {&props.line.text}
        </div>
    }
}
