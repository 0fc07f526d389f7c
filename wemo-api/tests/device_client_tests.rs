//! Control-channel tests for `DeviceClient` against a mocked endpoint.

use mockito::Matcher;
use quick_xml::escape::escape;
use wemo_api::bridge::DeviceClass;
use wemo_api::service::{BASIC_EVENT, BRIDGE, DEVICE_EVENT, INSIGHT};
use wemo_api::{ApiError, CapabilityMap, DeviceClient, EndpointDescriptor, ServiceDescriptor};

fn service(service_type: &str, name: &str) -> ServiceDescriptor {
    ServiceDescriptor {
        service_type: service_type.to_string(),
        service_id: format!("urn:Belkin:serviceId:{name}1"),
        control_path: format!("/upnp/control/{name}1"),
        event_path: format!("/upnp/event/{name}1"),
    }
}

fn client_for(server: &mockito::Server, services: &[(&str, &str)]) -> DeviceClient {
    let addr = server.host_with_port();
    let (host, port) = addr.rsplit_once(':').unwrap();
    let mut descriptor =
        EndpointDescriptor::new("uuid:Bridge-1_0-231442B0100000", host, port.parse().unwrap());
    for (service_type, name) in services {
        descriptor = descriptor.with_service(service(service_type, name));
    }
    DeviceClient::new(descriptor)
}

fn response(service_type: &str, action: &str, inner: &str) -> String {
    format!(
        r#"<?xml version="1.0"?><s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/"><s:Body><u:{action}Response xmlns:u="{service_type}">{inner}</u:{action}Response></s:Body></s:Envelope>"#
    )
}

#[test]
fn test_get_binary_state() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/upnp/control/basicevent1")
        .match_header("soapaction", "\"urn:Belkin:service:basicevent:1#GetBinaryState\"")
        .match_body(Matcher::Regex("<u:GetBinaryState xmlns:u=\"urn:Belkin:service:basicevent:1\">".to_string()))
        .with_body(response(BASIC_EVENT, "GetBinaryState", "<BinaryState>1</BinaryState>"))
        .create();

    let client = client_for(&server, &[(BASIC_EVENT, "basicevent")]);
    assert_eq!(client.get_binary_state().unwrap(), 1);
    mock.assert();
}

#[test]
fn test_set_brightness_sends_state_and_level() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/upnp/control/basicevent1")
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex("<BinaryState>1</BinaryState>".to_string()),
            Matcher::Regex("<brightness>40</brightness>".to_string()),
        ]))
        .with_body(response(BASIC_EVENT, "SetBinaryState", "<BinaryState>1</BinaryState>"))
        .create();

    let client = client_for(&server, &[(BASIC_EVENT, "basicevent")]);
    client.set_brightness(40).unwrap();
    mock.assert();
}

#[test]
fn test_get_brightness() {
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("POST", "/upnp/control/basicevent1")
        .with_body(response(
            BASIC_EVENT,
            "GetBinaryState",
            "<BinaryState>1</BinaryState><brightness>73</brightness>",
        ))
        .create();

    let client = client_for(&server, &[(BASIC_EVENT, "basicevent")]);
    assert_eq!(client.get_brightness().unwrap(), 73);
}

#[test]
fn test_non_200_is_reported_with_status_and_body() {
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("POST", "/upnp/control/basicevent1")
        .with_status(500)
        .with_body("Internal error")
        .create();

    let client = client_for(&server, &[(BASIC_EVENT, "basicevent")]);
    match client.set_binary_state(0) {
        Err(ApiError::HttpStatus { status, body }) => {
            assert_eq!(status, 500);
            assert_eq!(body, "Internal error");
        }
        other => panic!("expected HttpStatus, got {other:?}"),
    }
}

#[test]
fn test_mismatched_response_is_protocol_error() {
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("POST", "/upnp/control/basicevent1")
        .with_body(response(BASIC_EVENT, "SomethingElse", ""))
        .create();

    let client = client_for(&server, &[(BASIC_EVENT, "basicevent")]);
    assert!(matches!(client.get_binary_state(), Err(ApiError::Protocol(_))));
}

#[test]
fn test_get_end_devices() {
    let device_lists = r#"<?xml version="1.0" encoding="utf-8"?><DeviceLists><DeviceList><DeviceListType>Paired</DeviceListType><DeviceInfos><DeviceInfo><DeviceID>94103EA2B27751B2</DeviceID><FriendlyName>Hallway</FriendlyName><CapabilityIDs>10006,10008,10300</CapabilityIDs><CurrentState>1,200:0,45968:17936:0</CurrentState></DeviceInfo></DeviceInfos></DeviceList></DeviceLists>"#;

    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/upnp/control/bridge1")
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex("<DevUDN>uuid:Bridge-1_0-231442B0100000</DevUDN>".to_string()),
            Matcher::Regex("<ReqListType>PAIRED_LIST</ReqListType>".to_string()),
        ]))
        .with_body(response(
            BRIDGE,
            "GetEndDevices",
            &format!("<DeviceLists>{}</DeviceLists>", escape(device_lists)),
        ))
        .create();

    let client = client_for(&server, &[(BASIC_EVENT, "basicevent"), (BRIDGE, "bridge")]);
    let devices = client.get_end_devices().unwrap();
    mock.assert();

    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].friendly_name, "Hallway");
    assert_eq!(devices[0].device_class, DeviceClass::ColorLight);
    assert_eq!(devices[0].capabilities.get("10300"), Some("45968:17936:0"));
}

#[test]
fn test_set_device_status_for_group() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/upnp/control/bridge1")
        .match_header("soapaction", "\"urn:Belkin:service:bridge:1#SetDeviceStatus\"")
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex("&lt;IsGroupAction&gt;YES&lt;/IsGroupAction&gt;".to_string()),
            Matcher::Regex("&lt;DeviceID&gt;1432253402&lt;/DeviceID&gt;".to_string()),
            Matcher::Regex("&lt;CapabilityID&gt;10006,10008&lt;/CapabilityID&gt;".to_string()),
            Matcher::Regex("&lt;CapabilityValue&gt;1,128:0&lt;/CapabilityValue&gt;".to_string()),
        ]))
        .with_body(response(BRIDGE, "SetDeviceStatus", "<ErrorDeviceIDs></ErrorDeviceIDs>"))
        .create();

    let client = client_for(&server, &[(BRIDGE, "bridge")]);
    let mut capabilities = CapabilityMap::new();
    capabilities.insert("10006", "1");
    capabilities.insert("10008", "128:0");
    client.set_device_statuses("1432253402", &capabilities).unwrap();
    mock.assert();
}

#[test]
fn test_set_light_color() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/upnp/control/bridge1")
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex("&lt;IsGroupAction&gt;NO&lt;/IsGroupAction&gt;".to_string()),
            Matcher::Regex("&lt;CapabilityID&gt;10300&lt;/CapabilityID&gt;".to_string()),
            Matcher::Regex("&lt;CapabilityValue&gt;45968:17936:0&lt;/CapabilityValue&gt;".to_string()),
        ]))
        .with_body(response(BRIDGE, "SetDeviceStatus", ""))
        .create();

    let client = client_for(&server, &[(BRIDGE, "bridge")]);
    client.set_light_color("94103EA2B27751B2", 255, 0, 0).unwrap();
    mock.assert();
}

#[test]
fn test_get_device_status() {
    let status = r#"<?xml version="1.0" encoding="utf-8"?><DeviceStatusList><DeviceStatus><IsGroupAction>NO</IsGroupAction><DeviceID available="YES">94103EA2B27751B2</DeviceID><CapabilityID>10006,10008,30008,30009,3000A</CapabilityID><CapabilityValue>0,255:0,,,</CapabilityValue></DeviceStatus></DeviceStatusList>"#;

    let mut server = mockito::Server::new();
    let _mock = server
        .mock("POST", "/upnp/control/bridge1")
        .match_body(Matcher::Regex("<DeviceIDs>94103EA2B27751B2</DeviceIDs>".to_string()))
        .with_body(response(
            BRIDGE,
            "GetDeviceStatus",
            &format!("<DeviceStatusList>{}</DeviceStatusList>", escape(status)),
        ))
        .create();

    let client = client_for(&server, &[(BRIDGE, "bridge")]);
    let capabilities = client.get_device_status("94103EA2B27751B2").unwrap();
    assert_eq!(capabilities.get("10006"), Some("0"));
    assert_eq!(capabilities.get("10008"), Some("255:0"));
    assert_eq!(capabilities.len(), 5);
}

#[test]
fn test_get_attributes() {
    let list = "<attribute><name>Switch</name><value>0</value></attribute><attribute><name>Sensor</name><value>1</value></attribute>";

    let mut server = mockito::Server::new();
    let _mock = server
        .mock("POST", "/upnp/control/deviceevent1")
        .match_header("soapaction", "\"urn:Belkin:service:deviceevent:1#GetAttributes\"")
        .with_body(response(
            DEVICE_EVENT,
            "GetAttributes",
            &format!("<attributeList>{}</attributeList>", escape(list)),
        ))
        .create();

    let client = client_for(&server, &[(DEVICE_EVENT, "deviceevent")]);
    assert_eq!(
        client.get_attributes().unwrap(),
        vec![
            ("Switch".to_string(), "0".to_string()),
            ("Sensor".to_string(), "1".to_string()),
        ]
    );
}

#[test]
fn test_set_attributes_escapes_embedded_list() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/upnp/control/deviceevent1")
        .match_body(Matcher::Regex(
            "<attributeList>&lt;attribute&gt;&lt;name&gt;Switch&lt;/name&gt;&lt;value&gt;1&lt;/value&gt;&lt;/attribute&gt;</attributeList>".to_string(),
        ))
        .with_body(response(DEVICE_EVENT, "SetAttributes", ""))
        .create();

    let client = client_for(&server, &[(DEVICE_EVENT, "deviceevent")]);
    client.set_attributes(&[("Switch", "1")]).unwrap();
    mock.assert();
}

#[test]
fn test_get_insight_params() {
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("POST", "/upnp/control/insight1")
        .with_body(response(
            INSIGHT,
            "GetInsightParams",
            "<InsightParams>8|1450460139|6511|0|0|1209600|0|410|551366|1000|8000</InsightParams>",
        ))
        .create();

    let client = client_for(&server, &[(INSIGHT, "insight")]);
    let params = client.get_insight_params().unwrap();
    assert_eq!(params.binary_state, 8);
    assert_eq!(params.instant_power, 410.0);
    assert_eq!(params.today_consumed, 551366.0);
}

#[test]
fn test_rpc_follows_port_change() {
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("POST", "/upnp/control/basicevent1")
        .with_body(response(BASIC_EVENT, "GetBinaryState", "<BinaryState>0</BinaryState>"))
        .create();

    let client = client_for(&server, &[(BASIC_EVENT, "basicevent")]);
    let real_port = client.address().port();
    client.address().set_port(1);
    assert!(client.get_binary_state().unwrap_err().is_transport());
    assert!(client.address().is_failed());

    client.address().set_port(real_port);
    assert_eq!(client.get_binary_state().unwrap(), 0);
    assert!(!client.address().is_failed());
}

#[test]
fn test_non_200_does_not_mark_address_failed() {
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("POST", "/upnp/control/basicevent1")
        .with_status(503)
        .create();

    let client = client_for(&server, &[(BASIC_EVENT, "basicevent")]);
    assert!(client.get_binary_state().is_err());
    assert!(!client.address().is_failed());
}

#[test]
fn test_soap_fault_with_status_500_is_protocol_error() {
    let fault = r#"<?xml version="1.0"?><s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body><s:Fault><faultcode>s:Client</faultcode><faultstring>UPnPError</faultstring><detail><UPnPError xmlns="urn:schemas-upnp-org:control-1-0"><errorCode>501</errorCode><errorDescription>Action Failed</errorDescription></UPnPError></detail></s:Fault></s:Body></s:Envelope>"#;

    let mut server = mockito::Server::new();
    let _mock = server
        .mock("POST", "/upnp/control/basicevent1")
        .with_status(500)
        .with_body(fault)
        .create();

    let client = client_for(&server, &[(BASIC_EVENT, "basicevent")]);
    match client.set_binary_state(1) {
        Err(ApiError::Protocol(message)) => assert!(message.contains("501")),
        other => panic!("expected Protocol, got {other:?}"),
    }
}
