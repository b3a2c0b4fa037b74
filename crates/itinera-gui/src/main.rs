use iced::widget::{button, column, container, image, row, scrollable, text, Column};
use iced::{Element, Length, Subscription, Task, Theme};
use itinera_core::config::Settings;
use itinera_core::country_info::{CountryInfo, CountryInfoSource};
use itinera_core::itinerary::{move_stop, Itinerary, ItinerarySource};
use itinera_core::map::{is_closed_loop, plot_locations, Marker, TileLayer, DEFAULT_ZOOM};
use itinera_core::reference::ReferenceData;
use itinera_core::session::{Notice, Session};
use itinera_core::{Coordinates, Location, Planner, TripRequest};
use log::{info, warn};
use simplelog::{
    ColorChoice, CombinedLogger, Config, LevelFilter, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

mod map;
mod planner;
mod style;
use map::{RouteView, TileManager};
use planner::PlannerForm;

fn main() -> iced::Result {
    init_logging();
    iced::application("Itinera", App::update, App::view)
        .theme(|_| Theme::Dark)
        .subscription(App::subscription)
        .run_with(App::new)
}

fn init_logging() {
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        LevelFilter::Warn,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];

    let log_dir = itinera_core::get_config_root();
    let log_file = std::fs::create_dir_all(&log_dir)
        .and_then(|_| std::fs::File::create(log_dir.join("itinera.log")));
    match log_file {
        Ok(file) => loggers.push(WriteLogger::new(LevelFilter::Info, Config::default(), file)),
        Err(e) => eprintln!("Log file unavailable: {}", e),
    }

    let _ = CombinedLogger::init(loggers);
}

#[derive(Debug, Clone)]
enum Message {
    Form(planner::Message),

    // Results
    ItineraryReady(u64, Result<Itinerary, String>),
    CountryInfoLoaded(String, Option<CountryInfo>),
    FlagLoaded(String, Option<image::Handle>),

    // Itinerary list
    MoveStop { from: usize, to: usize },
    OpenInBrowser,

    // Map
    MapZoom {
        new_center: (f64, f64),
        new_zoom: f64,
    },
    HoverStop(Option<usize>),
    Tick,
}

struct App {
    settings: Settings,
    reference: Arc<ReferenceData>,
    session: Session,
    form: PlannerForm,
    // Results
    request: Option<TripRequest>,
    generation: u64,
    is_generating: bool,
    itinerary: Option<Itinerary>,
    /// Display order; starts as the itinerary's order and follows reordering.
    stops: Vec<Location>,
    /// Fixed once the itinerary arrives; reordering does not move it.
    center: Option<Coordinates>,
    markers: Vec<Marker>,
    status: String,
    notice: Option<Notice>,
    // Country panel
    country_info: Option<CountryInfo>,
    flag: Option<image::Handle>,
    // Map state
    tile_manager: TileManager,
    hovered_stop: Option<usize>,
    map_zoom: f64,
    map_center: (f64, f64), // (lat, lon)
}

impl App {
    fn new() -> (Self, Task<Message>) {
        let settings = Settings::load_default().unwrap_or_else(|e| {
            warn!("Settings unreadable, using defaults — error={:#}", e);
            Settings::default()
        });
        let reference = settings.reference_data().unwrap_or_else(|e| {
            warn!("Reference tables unreadable, using bundled — error={}", e);
            ReferenceData::bundled()
        });
        let form = PlannerForm::new(&reference);

        let app = Self {
            settings,
            reference: Arc::new(reference),
            session: Session::new(),
            form,
            request: None,
            generation: 0,
            is_generating: false,
            itinerary: None,
            stops: Vec::new(),
            center: None,
            markers: Vec::new(),
            status: "Pick a country and two cities.".to_string(),
            notice: None,
            country_info: None,
            flag: None,
            tile_manager: TileManager::new(TileLayer::default()),
            hovered_stop: None,
            map_zoom: DEFAULT_ZOOM as f64,
            map_center: (0.0, 0.0),
        };

        let task = match app.form.country.clone() {
            Some(country) => app.load_country_info(country),
            None => Task::none(),
        };

        (app, task)
    }

    fn subscription(&self) -> Subscription<Message> {
        // Tiles arrive on worker threads; poll so they get drawn.
        if self.tile_manager.has_pending() {
            iced::time::every(Duration::from_millis(250)).map(|_| Message::Tick)
        } else {
            Subscription::none()
        }
    }

    fn load_country_info(&self, country: String) -> Task<Message> {
        let settings = self.settings.clone();
        Task::perform(
            async move {
                let lookup = country.clone();
                let info = tokio::task::spawn_blocking(move || {
                    settings.country_info().lookup(&lookup)
                })
                .await
                .ok()
                .flatten();
                (country, info)
            },
            |(country, info)| Message::CountryInfoLoaded(country, info),
        )
    }

    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::Form(planner::Message::Submit) => self.submit(),
            Message::Form(planner::Message::Clear) => {
                self.session = self.session.clear();
                self.generation += 1;
                self.is_generating = false;
                self.request = None;
                self.itinerary = None;
                self.stops.clear();
                self.center = None;
                self.markers.clear();
                self.notice = None;
                self.hovered_stop = None;
                self.status = "Cleared.".to_string();
                Task::none()
            }
            Message::Form(msg) => {
                if !self.session.is_form_enabled() {
                    return Task::none();
                }
                let previous = self.form.country.clone();
                self.form.update(msg, &self.reference);
                match self.form.country.clone() {
                    Some(country) if previous.as_ref() != Some(&country) => {
                        self.country_info = None;
                        self.flag = None;
                        self.load_country_info(country)
                    }
                    _ => Task::none(),
                }
            }
            Message::ItineraryReady(generation, result) => {
                if generation != self.generation {
                    info!("Discarding stale itinerary — generation={}", generation);
                    return Task::none();
                }
                self.is_generating = false;
                match result {
                    Ok(itinerary) => {
                        self.center = itinerary.center();
                        if let Some(center) = self.center {
                            self.map_center = (center.lat, center.lon);
                            self.map_zoom = DEFAULT_ZOOM as f64;
                        }
                        self.status = match itinerary.source {
                            ItinerarySource::Cache => "Loaded from cache.".to_string(),
                            ItinerarySource::Generated if itinerary.is_empty() => String::new(),
                            ItinerarySource::Generated => "Itinerary generated.".to_string(),
                        };
                        self.stops = itinerary.locations.clone();
                        self.itinerary = Some(itinerary);
                        self.refresh_markers();
                    }
                    Err(e) => {
                        warn!("Itinerary generation failed — error={}", e);
                        self.status = format!("Error: {}", e);
                    }
                }
                Task::none()
            }
            Message::CountryInfoLoaded(country, info) => {
                if self.form.country.as_deref() != Some(country.as_str()) {
                    return Task::none();
                }
                let flag_url = info.as_ref().and_then(|i| i.flag_png.clone());
                self.country_info = info;
                match flag_url {
                    Some(url) => Task::perform(fetch_flag(url), move |handle| {
                        Message::FlagLoaded(country.clone(), handle)
                    }),
                    None => Task::none(),
                }
            }
            Message::FlagLoaded(country, handle) => {
                if self.form.country.as_deref() == Some(country.as_str()) {
                    self.flag = handle;
                }
                Task::none()
            }
            Message::MoveStop { from, to } => {
                if let Some(reordered) = move_stop(&self.stops, from, to) {
                    self.stops = reordered;
                    self.hovered_stop = None;
                    self.refresh_markers();
                }
                Task::none()
            }
            Message::OpenInBrowser => {
                self.status = match self.export_html() {
                    Ok(path) => format!("Map opened: {}", path.display()),
                    Err(e) => format!("Error: {}", e),
                };
                Task::none()
            }
            Message::MapZoom {
                new_center,
                new_zoom,
            } => {
                self.map_center = new_center;
                self.map_zoom = new_zoom;
                Task::none()
            }
            Message::HoverStop(index) => {
                self.hovered_stop = index;
                Task::none()
            }
            Message::Tick => Task::none(),
        }
    }

    fn submit(&mut self) -> Task<Message> {
        // Validate only when the session would accept the request.
        let request = if self.session.is_showing() {
            None
        } else {
            match self.form.request() {
                Ok(request) => Some(request),
                Err(e) => {
                    self.status = e;
                    return Task::none();
                }
            }
        };

        let transition = self.session.submit();
        self.session = transition.session;
        self.notice = transition.notice;

        match request {
            Some(request) if transition.start_generation => {
                self.generation += 1;
                self.is_generating = true;
                self.status = "Generating itinerary...".to_string();
                self.request = Some(request.clone());

                let generation = self.generation;
                let settings = self.settings.clone();
                let reference = Arc::clone(&self.reference);
                Task::perform(
                    async move {
                        tokio::task::spawn_blocking(move || {
                            plan_trip(&settings, &reference, &request)
                        })
                        .await
                        .map_err(|e| e.to_string())
                        .and_then(|r| r)
                    },
                    move |result| Message::ItineraryReady(generation, result),
                )
            }
            _ => Task::none(),
        }
    }

    fn export_html(&self) -> Result<PathBuf, String> {
        let (Some(itinerary), Some(center)) = (&self.itinerary, self.center) else {
            return Err("Nothing to export".to_string());
        };
        let file_name = itinerary.key.file_name().replace(".csv", ".html");
        let path = std::env::temp_dir().join(file_name);

        plot_locations(&self.stops, center)
            .write_html(&path, &itinerary.key.country)
            .map_err(|e| e.to_string())?;
        open::that(&path).map_err(|e| e.to_string())?;
        info!("Opened route map — path={}", path.display());
        Ok(path)
    }

    fn view(&self) -> Element<'_, Message> {
        let sidebar = container(
            column![
                text("Itinera").size(24),
                text("Let AI plan your next trip").size(12),
                self.form
                    .view(self.session.is_form_enabled())
                    .map(Message::Form),
                self.view_country_panel(),
            ]
            .spacing(20),
        )
        .width(Length::Fixed(300.0))
        .height(Length::Fill)
        .padding(20)
        .style(style::container_sidebar);

        row![sidebar, self.view_results()]
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }

    fn view_country_panel(&self) -> Element<'_, Message> {
        let Some(info) = &self.country_info else {
            return column![].into();
        };

        let mut panel = Column::new().spacing(6);
        if let Some(flag) = &self.flag {
            panel = panel.push(image(flag.clone()).width(Length::Fixed(120.0)));
        }
        panel = panel.push(text(&info.official_name).size(16));
        if let Some(capital) = &info.capital {
            panel = panel.push(text(format!("Capital: {}", capital)).size(13));
        }
        if let Some(currencies) = &info.currencies {
            panel = panel.push(text("Currencies:").size(13));
            for currency in currencies {
                panel = panel.push(
                    text(format!("  {} ({})", currency.name, currency.symbol)).size(13),
                );
            }
        }

        container(panel)
            .padding(12)
            .width(Length::Fill)
            .style(style::container_card)
            .into()
    }

    fn view_results(&self) -> Element<'_, Message> {
        let mut content = Column::new().spacing(15).padding(20);

        if let Some(notice) = self.notice {
            content = content.push(
                container(text(notice.message()).size(14))
                    .padding(10)
                    .width(Length::Fill)
                    .style(style::container_notice),
            );
        }

        if !self.status.is_empty() {
            content = content.push(
                text(&self.status)
                    .size(12)
                    .color(style::palette::TEXT_SECONDARY),
            );
        }

        let Some(request) = &self.request else {
            return content.into();
        };
        if self.is_generating {
            return content.into();
        }

        content = content.push(
            text(format!(
                "{} cities to visit in {}",
                request.num_cities, request.country
            ))
            .size(20),
        );

        if self.stops.is_empty() {
            if self.itinerary.is_some() {
                content = content.push(
                    column![
                        text("Sorry, it was not possible to generate the itinerary...").size(16),
                        text("Clear and try another!").size(13),
                    ]
                    .spacing(4),
                );
            }
            return content.into();
        }

        let list = scrollable(self.view_stop_list()).height(Length::Fixed(220.0));

        let map_view: Element<'_, Message> = RouteView {
            markers: &self.markers,
            closed: is_closed_loop(&self.stops),
            hovered_stop: self.hovered_stop,
            tile_manager: &self.tile_manager,
            zoom: self.map_zoom,
            center: self.map_center,
        }
        .into();

        let open_btn = button(text("Open in browser").size(12))
            .on_press(Message::OpenInBrowser)
            .style(style::button_secondary)
            .padding([6, 12]);

        content
            .push(list)
            .push(
                container(map_view)
                    .width(Length::Fill)
                    .height(Length::Fill)
                    .style(style::container_card),
            )
            .push(open_btn)
            .into()
    }

    fn refresh_markers(&mut self) {
        self.markers = match self.center {
            Some(center) => plot_locations(&self.stops, center).markers,
            None => Vec::new(),
        };
    }

    fn view_stop_list(&self) -> Element<'_, Message> {
        let last = self.stops.len().saturating_sub(1);
        let rows = self.stops.iter().enumerate().map(|(i, stop)| {
            let up = button(text("Up").size(11)).style(style::button_ghost);
            let up = if i > 0 {
                up.on_press(Message::MoveStop { from: i, to: i - 1 })
            } else {
                up
            };
            let down = button(text("Down").size(11)).style(style::button_ghost);
            let down = if i < last {
                down.on_press(Message::MoveStop { from: i, to: i + 1 })
            } else {
                down
            };

            container(
                row![
                    text(format!("{}.", i + 1)).size(13).width(Length::Fixed(28.0)),
                    text(&stop.name).size(14).width(Length::Fill),
                    text(format!(
                        "{:.4}, {:.4}",
                        stop.coordinates.lat, stop.coordinates.lon
                    ))
                    .size(11)
                    .color(style::palette::TEXT_SECONDARY),
                    up,
                    down,
                ]
                .spacing(8)
                .align_y(iced::Alignment::Center),
            )
            .padding([4, 10])
            .style(style::container_stop(self.hovered_stop == Some(i)))
            .into()
        });

        Column::with_children(rows).spacing(4).into()
    }
}

fn plan_trip(
    settings: &Settings,
    reference: &ReferenceData,
    request: &TripRequest,
) -> Result<Itinerary, String> {
    let generator = settings.completion_client().map_err(|e| e.to_string())?;
    let geocoder = settings.geocoder().map_err(|e| e.to_string())?;
    let cache = settings.cache();
    Planner::new(
        reference,
        &generator,
        &geocoder,
        &cache,
        settings.model.clone(),
    )
    .plan(request)
    .map_err(|e| e.to_string())
}

async fn fetch_flag(url: String) -> Option<image::Handle> {
    tokio::task::spawn_blocking(move || {
        let response = ureq::get(&url)
            .timeout(Duration::from_secs(10))
            .call()
            .map_err(|e| warn!("Flag download failed — url={} error={}", url, e))
            .ok()?;
        let mut bytes = Vec::new();
        std::io::Read::read_to_end(&mut response.into_reader(), &mut bytes).ok()?;
        Some(image::Handle::from_bytes(bytes))
    })
    .await
    .ok()
    .flatten()
}
