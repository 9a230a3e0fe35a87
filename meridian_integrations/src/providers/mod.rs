pub mod open_er_api;
pub mod rest_countries;

pub use open_er_api::OpenErApiClient;
pub use rest_countries::RestCountriesClient;
