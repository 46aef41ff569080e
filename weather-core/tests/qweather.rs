//! QWeather client tests against a local mock server.

use cityweather_core::{
    City, Endpoints, WeatherKind, WeatherProvider, provider::qweather::QWeatherProvider,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn provider(server: &MockServer) -> QWeatherProvider {
    let endpoints = Endpoints { weather_url: server.uri(), geo_url: server.uri() };
    QWeatherProvider::with_endpoints("TEST_KEY".to_string(), &endpoints)
}

#[tokio::test]
async fn lookup_city_maps_locations() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/city/lookup"))
        .and(query_param("location", "shanghai"))
        .and(query_param("number", "20"))
        .and(query_param("key", "TEST_KEY"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{
                "code": "200",
                "location": [
                    {"name": "上海", "id": "101020100", "lat": "31.23171", "lon": "121.47264",
                     "adm2": "上海", "adm1": "上海市", "country": "中国", "tz": "Asia/Shanghai",
                     "utcOffset": "+08:00", "isDst": "0", "type": "city", "rank": "11",
                     "fxLink": "https://www.qweather.com/weather/shanghai-101020100.html"}
                ]
            }"#,
        ))
        .mount(&server)
        .await;

    let cities = provider(&server).lookup_city("shanghai").await.unwrap();

    assert_eq!(cities, vec![City::new("101020100", "上海", "上海", "上海市", "中国")]);
}

#[tokio::test]
async fn lookup_with_no_matches_is_empty() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/city/lookup"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"code":"404"}"#))
        .mount(&server)
        .await;

    let cities = provider(&server).lookup_city("nowhere").await.unwrap();
    assert!(cities.is_empty());
}

#[tokio::test]
async fn api_error_code_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v7/weather/now"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"code":"401"}"#))
        .mount(&server)
        .await;

    let err = provider(&server).current_conditions("101010100").await.unwrap_err();
    assert!(err.to_string().contains("returned code 401"));
}

#[tokio::test]
async fn http_failure_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v7/weather/7d"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .mount(&server)
        .await;

    let err = provider(&server).forecast("101010100").await.unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("status 500"));
    assert!(msg.contains("internal"));
}

#[tokio::test]
async fn current_conditions_are_parsed() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v7/weather/now"))
        .and(query_param("location", "101010100"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{
                "code": "200",
                "updateTime": "2024-05-03T10:02+08:00",
                "now": {
                    "obsTime": "2024-05-03T09:55+08:00", "temp": "24", "feelsLike": "26",
                    "icon": "101", "text": "多云", "wind360": "123", "windDir": "东南风",
                    "windScale": "1", "windSpeed": "3", "humidity": "72", "precip": "0.0",
                    "pressure": "1003", "vis": "16", "cloud": "10", "dew": "21"
                }
            }"#,
        ))
        .mount(&server)
        .await;

    let now = provider(&server).current_conditions("101010100").await.unwrap();

    assert_eq!(now.temperature_c, 24.0);
    assert_eq!(now.feels_like_c, 26.0);
    assert_eq!(now.condition, "多云");
    assert_eq!(now.kind(), WeatherKind::PartlyCloudyDay);
    assert_eq!(now.humidity_pct, 72);
    assert_eq!(now.wind_dir, "东南风");
    assert!(now.observation_time.is_some());
}

#[tokio::test]
async fn missing_now_block_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v7/weather/now"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"code":"200"}"#))
        .mount(&server)
        .await;

    let err = provider(&server).current_conditions("101010100").await.unwrap_err();
    assert!(err.to_string().contains("contained no data"));
}

#[tokio::test]
async fn forecast_days_are_parsed_in_order() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v7/weather/7d"))
        .and(query_param("location", "101010100"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{
                "code": "200",
                "daily": [
                    {"fxDate": "2024-05-03", "tempMax": "30", "tempMin": "20",
                     "iconDay": "100", "textDay": "晴", "iconNight": "150", "textNight": "晴",
                     "windDirDay": "北风", "windScaleDay": "1-3",
                     "windDirNight": "北风", "windScaleNight": "1-3"},
                    {"fxDate": "2024-05-04", "tempMax": "25", "tempMin": "-1",
                     "iconDay": "305", "textDay": "小雨", "iconNight": "404", "textNight": "雨夹雪",
                     "windDirDay": "东风", "windScaleDay": "3-4",
                     "windDirNight": "东风", "windScaleNight": "3-4"}
                ]
            }"#,
        ))
        .mount(&server)
        .await;

    let days = provider(&server).forecast("101010100").await.unwrap();

    assert_eq!(days.len(), 2);
    assert_eq!(days[0].short_date(), "5/3");
    assert_eq!(days[0].temp_max_c, 30);
    assert_eq!(days[1].temp_min_c, -1);
    assert_eq!(days[1].day_kind(), WeatherKind::Rain);
    assert_eq!(days[1].night_kind(), WeatherKind::Sleet);
    assert_eq!(days[1].wind_scale_night, "3-4");
}
