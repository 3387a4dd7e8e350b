//! Upstream flight-search API: wire format and transport.
//!
//! Request bodies and response parsing follow the unified search endpoint's
//! JSON contract. The [`Transport`] trait is the seam between the engine and
//! the network; [`ReqwestTransport`] is the production implementation.

mod request;
mod response;
mod reqwest_transport;
mod transport;

pub use request::{country_query, detail_query, everywhere_query, QueryKind};
pub use response::{parse_cities, parse_countries, parse_itineraries, Itinerary, QuotedLocation};
pub use reqwest_transport::ReqwestTransport;
pub use transport::{Headers, Transport, TransportError, TransportResponse, TransportSession};

use crate::schedule::TripWindow;

/// Public booking link for a city and trip window.
pub fn booking_url(
    site_url: &str,
    origin_sky_code: &str,
    city_sky_code: &str,
    window: &TripWindow,
    adults: u32,
    min_departure_hour: u32,
) -> String {
    format!(
        "{}/transport/fluge/{}/{}/{}/{}/?adultsv2={}&cabinclass=economy&rtn=1&preferdirects=true&departure-times={}-1439",
        site_url.trim_end_matches('/'),
        urlencoding::encode(&origin_sky_code.to_lowercase()),
        urlencoding::encode(&city_sky_code.to_lowercase()),
        window.departure.format("%y%m%d"),
        window.return_date.format("%y%m%d"),
        adults,
        min_departure_hour * 60
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_booking_url() {
        let window = TripWindow::new(NaiveDate::from_ymd_opt(2026, 1, 9).unwrap(), 2);
        let url = booking_url("https://www.skyscanner.at/", "VIE", "barc", &window, 2, 14);
        assert_eq!(
            url,
            "https://www.skyscanner.at/transport/fluge/vie/barc/260109/260111/?adultsv2=2&cabinclass=economy&rtn=1&preferdirects=true&departure-times=840-1439"
        );
    }
}
