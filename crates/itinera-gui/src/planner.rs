use crate::style;
use iced::widget::{button, column, pick_list, row, text, text_input};
use iced::{Element, Length};
use itinera_core::reference::ReferenceData;
use itinera_core::{TripRequest, MIN_CITIES};

pub const DEFAULT_NUM_CITIES: u32 = 5;

/// The trip form: country, first and last city, trip length.
#[derive(Debug, Clone)]
pub struct PlannerForm {
    pub countries: Vec<String>,
    pub cities: Vec<String>,
    pub country: Option<String>,
    pub first_city: Option<String>,
    pub last_city: Option<String>,
    pub num_cities: String,
}

#[derive(Debug, Clone)]
pub enum Message {
    CountrySelected(String),
    FirstCitySelected(String),
    LastCitySelected(String),
    NumCitiesChanged(String),
    // Handled in main (session transitions); no-op here.
    Submit,
    Clear,
}

impl PlannerForm {
    pub fn new(reference: &ReferenceData) -> Self {
        let mut form = Self {
            countries: reference.country_names(),
            cities: Vec::new(),
            country: None,
            first_city: None,
            last_city: None,
            num_cities: DEFAULT_NUM_CITIES.to_string(),
        };
        if let Some(country) = reference.default_country() {
            form.select_country(reference, country.to_string());
        }
        form
    }

    /// Both city pick lists start on the country's first city.
    fn select_country(&mut self, reference: &ReferenceData, country: String) {
        self.cities = reference.cities_in(&country).to_vec();
        self.first_city = self.cities.first().cloned();
        self.last_city = self.cities.first().cloned();
        self.country = Some(country);
    }

    pub fn update(&mut self, message: Message, reference: &ReferenceData) {
        match message {
            Message::CountrySelected(country) => {
                if self.country.as_deref() != Some(country.as_str()) {
                    self.select_country(reference, country);
                }
            }
            Message::FirstCitySelected(city) => self.first_city = Some(city),
            Message::LastCitySelected(city) => self.last_city = Some(city),
            Message::NumCitiesChanged(value) => {
                if value.chars().all(|c| c.is_ascii_digit()) {
                    self.num_cities = value;
                }
            }
            Message::Submit | Message::Clear => {}
        }
    }

    pub fn request(&self) -> Result<TripRequest, String> {
        let country = self.country.as_deref().ok_or("Pick a country")?;
        let first = self.first_city.as_deref().ok_or("Pick the first city")?;
        let last = self.last_city.as_deref().ok_or("Pick the last city")?;
        let num_cities: u32 = self
            .num_cities
            .parse()
            .map_err(|_| format!("Number of cities must be at least {}", MIN_CITIES))?;
        TripRequest::new(country, first, last, num_cities).map_err(|e| e.to_string())
    }

    /// Inputs are inert while `enabled` is false; Submit stays live so a
    /// second request can be refused with a notice.
    pub fn view(&self, enabled: bool) -> Element<'_, Message> {
        let country_pick = pick_list(
            self.countries.as_slice(),
            self.country.clone(),
            Message::CountrySelected,
        )
        .width(Length::Fill);
        let first_pick = pick_list(
            self.cities.as_slice(),
            self.first_city.clone(),
            Message::FirstCitySelected,
        )
        .width(Length::Fill);
        let last_pick = pick_list(
            self.cities.as_slice(),
            self.last_city.clone(),
            Message::LastCitySelected,
        )
        .width(Length::Fill);

        let num_input = text_input("5", &self.num_cities).padding(8);

        // pick_list has no disabled state; show plain text instead
        let (country_field, first_field, last_field, num_field): (
            Element<'_, Message>,
            Element<'_, Message>,
            Element<'_, Message>,
            Element<'_, Message>,
        ) = if enabled {
            (
                country_pick.into(),
                first_pick.into(),
                last_pick.into(),
                num_input.on_input(Message::NumCitiesChanged).into(),
            )
        } else {
            (
                locked_value(self.country.as_deref()),
                locked_value(self.first_city.as_deref()),
                locked_value(self.last_city.as_deref()),
                num_input.into(),
            )
        };

        let submit = button(text("Generate itinerary").size(13))
            .on_press(Message::Submit)
            .style(style::button_primary)
            .padding([8, 14]);
        let clear = button(text("Clear").size(13))
            .on_press(Message::Clear)
            .style(style::button_secondary)
            .padding([8, 14]);

        column![
            label("Country"),
            country_field,
            label("First city"),
            first_field,
            label("Last city"),
            last_field,
            label("Number of cities to visit"),
            num_field,
            row![submit, clear].spacing(10),
        ]
        .spacing(8)
        .into()
    }
}

fn label(value: &str) -> Element<'_, Message> {
    text(value)
        .size(12)
        .color(style::palette::TEXT_SECONDARY)
        .into()
}

fn locked_value(value: Option<&str>) -> Element<'static, Message> {
    text(value.unwrap_or("-").to_string())
        .size(14)
        .color(style::palette::TEXT_PRIMARY)
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> (PlannerForm, ReferenceData) {
        let reference = ReferenceData::bundled();
        (PlannerForm::new(&reference), reference)
    }

    #[test]
    fn test_defaults() {
        let (form, _) = form();
        assert_eq!(form.country.as_deref(), Some("Portugal"));
        assert_eq!(form.num_cities, "5");
        assert!(form.cities.iter().any(|c| c == "Lisbon"));
        assert_eq!(form.first_city, form.cities.first().cloned());
        assert_eq!(form.last_city, form.first_city);
    }

    #[test]
    fn test_country_change_rescopes_cities() {
        let (mut form, reference) = form();
        form.update(Message::CountrySelected("Italy".into()), &reference);
        assert_eq!(form.cities, reference.cities_in("Italy"));
        assert!(!form.cities.iter().any(|c| c == "Lisbon"));
        assert_eq!(form.first_city, form.cities.first().cloned());
    }

    #[test]
    fn test_num_cities_accepts_digits_only() {
        let (mut form, reference) = form();
        form.update(Message::NumCitiesChanged("7".into()), &reference);
        assert_eq!(form.num_cities, "7");
        form.update(Message::NumCitiesChanged("7a".into()), &reference);
        assert_eq!(form.num_cities, "7");
        form.update(Message::NumCitiesChanged(String::new()), &reference);
        assert_eq!(form.num_cities, "");
    }

    #[test]
    fn test_long_trips_are_not_capped() {
        let (mut form, reference) = form();
        form.update(Message::NumCitiesChanged("1500".into()), &reference);
        assert_eq!(form.num_cities, "1500");
        assert_eq!(form.request().unwrap().num_cities, 1500);
    }

    #[test]
    fn test_request_validation() {
        let (mut form, reference) = form();
        form.update(Message::FirstCitySelected("Lisbon".into()), &reference);
        form.update(Message::LastCitySelected("Porto".into()), &reference);
        form.update(Message::NumCitiesChanged("3".into()), &reference);
        let request = form.request().unwrap();
        assert_eq!(request.first_city, "Lisbon");
        assert_eq!(request.last_city, "Porto");
        assert_eq!(request.num_cities, 3);

        form.update(Message::NumCitiesChanged("2".into()), &reference);
        assert!(form.request().is_err());
        form.update(Message::NumCitiesChanged(String::new()), &reference);
        assert!(form.request().is_err());
    }
}
