use iced::widget::{button, container};
use iced::{Background, Border, Color, Shadow, Theme};

pub mod palette {
    use iced::Color;

    pub const BACKGROUND: Color = Color::from_rgb(0.12, 0.12, 0.12); // #1e1e1e
    pub const SURFACE: Color = Color::from_rgb(0.18, 0.18, 0.18); // #2d2d2d
    pub const ACCENT_RED: Color = Color::from_rgb(1.0, 0.294, 0.294); // #ff4b4b, same as the markers
    pub const ACCENT_AMBER: Color = Color::from_rgb(0.96, 0.62, 0.04); // #f59e0b
    pub const TEXT_PRIMARY: Color = Color::from_rgb(0.9, 0.9, 0.9);
    pub const TEXT_SECONDARY: Color = Color::from_rgb(0.6, 0.6, 0.6);
    pub const BORDER: Color = Color::from_rgb(0.25, 0.25, 0.25);
}

// Container Styles
pub fn container_sidebar(_theme: &Theme) -> container::Style {
    container::Style {
        background: Some(Background::Color(palette::BACKGROUND)),
        border: Border {
            color: palette::BORDER,
            width: 1.0,
            radius: 0.0.into(),
        },
        ..Default::default()
    }
}

pub fn container_card(_theme: &Theme) -> container::Style {
    container::Style {
        background: Some(Background::Color(palette::SURFACE)),
        border: Border {
            color: palette::BORDER,
            width: 1.0,
            radius: 8.0.into(),
        },
        shadow: Shadow {
            color: Color::from_rgba(0.0, 0.0, 0.0, 0.5),
            offset: iced::Vector::new(0.0, 4.0),
            blur_radius: 12.0,
        },
        ..Default::default()
    }
}

/// Banner for "Clear first!" and similar.
pub fn container_notice(_theme: &Theme) -> container::Style {
    container::Style {
        background: Some(Background::Color(Color::from_rgba(0.96, 0.62, 0.04, 0.15))),
        text_color: Some(palette::ACCENT_AMBER),
        border: Border {
            color: palette::ACCENT_AMBER,
            width: 1.0,
            radius: 6.0.into(),
        },
        ..Default::default()
    }
}

/// Itinerary row; highlighted while its marker is hovered on the map.
pub fn container_stop(highlighted: bool) -> impl Fn(&Theme) -> container::Style {
    move |_theme| container::Style {
        background: Some(Background::Color(if highlighted {
            Color::from_rgba(1.0, 0.294, 0.294, 0.2)
        } else {
            palette::SURFACE
        })),
        border: Border {
            color: if highlighted {
                palette::ACCENT_RED
            } else {
                palette::BORDER
            },
            width: 1.0,
            radius: 6.0.into(),
        },
        ..Default::default()
    }
}

// Button Styles
pub fn button_primary(_theme: &Theme, status: button::Status) -> button::Style {
    let base = button::Style {
        background: None,
        text_color: palette::TEXT_PRIMARY,
        border: Border::default(),
        shadow: Shadow::default(),
    };

    match status {
        button::Status::Active => button::Style {
            background: Some(Background::Color(palette::ACCENT_RED)),
            border: Border {
                radius: 6.0.into(),
                ..Default::default()
            },
            text_color: Color::WHITE,
            shadow: Shadow {
                color: Color::from_rgba(1.0, 0.294, 0.294, 0.4),
                offset: iced::Vector::new(0.0, 2.0),
                blur_radius: 8.0,
            },
            ..base
        },
        button::Status::Hovered => button::Style {
            background: Some(Background::Color(Color::from_rgb(1.0, 0.42, 0.42))),
            border: Border {
                radius: 6.0.into(),
                ..Default::default()
            },
            text_color: Color::WHITE,
            shadow: Shadow {
                color: Color::from_rgba(1.0, 0.294, 0.294, 0.6),
                offset: iced::Vector::new(0.0, 4.0),
                blur_radius: 12.0,
            },
            ..base
        },
        button::Status::Pressed => button::Style {
            background: Some(Background::Color(Color::from_rgb(0.85, 0.22, 0.22))),
            border: Border {
                radius: 6.0.into(),
                ..Default::default()
            },
            text_color: Color::WHITE,
            ..base
        },
        button::Status::Disabled => button::Style {
            background: Some(Background::Color(Color::from_rgba(1.0, 0.294, 0.294, 0.3))),
            border: Border {
                radius: 6.0.into(),
                ..Default::default()
            },
            text_color: palette::TEXT_SECONDARY,
            ..base
        },
    }
}

pub fn button_secondary(_theme: &Theme, status: button::Status) -> button::Style {
    let base = button::Style {
        background: Some(Background::Color(palette::SURFACE)),
        text_color: palette::TEXT_PRIMARY,
        border: Border {
            color: palette::BORDER,
            width: 1.0,
            radius: 6.0.into(),
        },
        shadow: Shadow::default(),
    };

    match status {
        button::Status::Hovered => button::Style {
            background: Some(Background::Color(Color::from_rgb(0.25, 0.25, 0.25))),
            text_color: Color::WHITE,
            shadow: Shadow {
                color: Color::from_rgba(0.0, 0.0, 0.0, 0.3),
                offset: iced::Vector::new(0.0, 2.0),
                blur_radius: 8.0,
            },
            ..base
        },
        button::Status::Disabled => button::Style {
            text_color: palette::TEXT_SECONDARY,
            ..base
        },
        _ => base,
    }
}

pub fn button_ghost(_theme: &Theme, status: button::Status) -> button::Style {
    let base = button::Style {
        background: None,
        text_color: palette::TEXT_PRIMARY,
        border: Border::default(),
        shadow: Shadow::default(),
    };

    match status {
        button::Status::Hovered => button::Style {
            background: Some(Background::Color(Color::from_rgba(1.0, 1.0, 1.0, 0.1))),
            text_color: Color::WHITE,
            border: Border {
                radius: 6.0.into(),
                ..Default::default()
            },
            ..base
        },
        button::Status::Disabled => button::Style {
            text_color: Color::from_rgba(1.0, 1.0, 1.0, 0.2),
            ..base
        },
        _ => base,
    }
}
