use crate::models::{
    CalculationType, Council, IndicatorTemplate, Priority, ReportCriteria, Unit,
};

pub static TEMPLATES: [IndicatorTemplate; 8] = [
    IndicatorTemplate {
        id: "mision",
        priority: Priority::EmergingGeneration,
        name: "Prepararse y servir una misión",
        description: "Número total de jóvenes sirviendo actualmente.",
        criteria: ReportCriteria::Cumulative,
        calculation: CalculationType::Cumulative,
        goal: 25.0,
        aggregate_as_ratio: false,
    },
    IndicatorTemplate {
        id: "bautismos",
        priority: Priority::OrdinancesAndCovenants,
        name: "Convenios bautismales",
        description: "Bautismos confirmados en el mes.",
        criteria: ReportCriteria::Cumulative,
        calculation: CalculationType::Sum,
        goal: 150.0,
        aggregate_as_ratio: false,
    },
    IndicatorTemplate {
        id: "sacramental",
        priority: Priority::OrdinancesAndCovenants,
        name: "Asistencia a reunión sacramental",
        description: "Promedio de asistencia dominical.",
        criteria: ReportCriteria::MonthlyAverage,
        calculation: CalculationType::Average,
        goal: 665.0,
        aggregate_as_ratio: false,
    },
    IndicatorTemplate {
        id: "templo",
        priority: Priority::OrdinancesAndCovenants,
        name: "Obra del templo e historia familiar",
        description: "Miembros con recomendaciones vigentes.",
        criteria: ReportCriteria::Cumulative,
        calculation: CalculationType::Cumulative,
        goal: 600.0,
        aggregate_as_ratio: false,
    },
    IndicatorTemplate {
        id: "ministracion",
        priority: Priority::Ministering,
        name: "Entrevistas de ministración",
        description: "Porcentaje de entrevistas completadas.",
        criteria: ReportCriteria::MonthlyAverage,
        calculation: CalculationType::Average,
        goal: 100.0,
        aggregate_as_ratio: true,
    },
    IndicatorTemplate {
        id: "diezmo",
        priority: Priority::Ministering,
        name: "Donantes de diezmos",
        description: "Número de donantes distintos.",
        criteria: ReportCriteria::Cumulative,
        calculation: CalculationType::Cumulative,
        goal: 500.0,
        aggregate_as_ratio: false,
    },
    IndicatorTemplate {
        id: "ofrendas",
        priority: Priority::Ministering,
        name: "Donantes de ofrendas de ayuno",
        description: "Número de donantes de ofrendas.",
        criteria: ReportCriteria::Cumulative,
        calculation: CalculationType::Cumulative,
        goal: 500.0,
        aggregate_as_ratio: false,
    },
    IndicatorTemplate {
        id: "sacerdocio",
        priority: Priority::Others,
        name: "Ordenaciones Sacerdocio Melquicedec",
        description: "Hermanos ordenados a Élder o Sumo Sacerdote.",
        criteria: ReportCriteria::Cumulative,
        calculation: CalculationType::Sum,
        goal: 32.0,
        aggregate_as_ratio: false,
    },
];

const fn unit(
    id: &'static str,
    name: &'static str,
    council: Council,
    access_key: &'static str,
) -> Unit {
    Unit {
        id,
        name,
        council,
        access_key,
    }
}

pub static UNITS: [Unit; 22] = [
    unit("tegucigalpa", "Estaca Tegucigalpa", Council::Tegucigalpa, "STK-TEG-77"),
    unit("porvenir", "Estaca Porvenir", Council::Tegucigalpa, "STK-POR-77"),
    unit("choluteca", "Estaca Choluteca", Council::Tegucigalpa, "STK-CHO-77"),
    unit("monjaras", "Distrito Monjaras", Council::Tegucigalpa, "DST-MON-77"),
    unit("san-lorenzo", "Distrito San Lorenzo", Council::Tegucigalpa, "DST-SLO-77"),
    unit("la-esperanza", "Estaca La Esperanza", Council::Tegucigalpa, "STK-ESP-77"),
    unit("uyuca", "Estaca Uyuca", Council::Tegucigalpa, "STK-UYU-77"),
    unit("guaymuras", "Estaca Guaymuras", Council::Tegucigalpa, "STK-GUA-77"),
    unit("villa-olimpica", "Estaca Villa Olímpica", Council::Tegucigalpa, "STK-VOL-77"),
    unit("mision-tegucigalpa", "Misión Tegucigalpa", Council::Tegucigalpa, "MSN-TEG-77"),
    unit("danli", "Estaca Danlí", Council::Tegucigalpa, "STK-DAN-77"),
    unit("comayaguela", "Estaca Comayagüela", Council::Comayaguela, "STK-COM-77"),
    unit("comayagua", "Estaca Comayagua", Council::Comayaguela, "STK-CMA-77"),
    unit("toncontin", "Estaca Toncontin", Council::Comayaguela, "STK-TON-77"),
    unit("country", "Estaca Country", Council::Comayaguela, "STK-COU-77"),
    unit("loarque", "Estaca Loarque", Council::Comayaguela, "STK-LOA-77"),
    unit("bulevard", "Estaca Bulevard", Council::Comayaguela, "STK-BUL-77"),
    unit("torocagua", "Estaca Torocagua", Council::Comayaguela, "STK-TOR-77"),
    unit("mision-comayaguela", "Misión Comayagüela", Council::Comayaguela, "MSN-COM-77"),
    unit("intibuca", "Distrito Intibucá", Council::Comayaguela, "DST-INT-77"),
    unit("juticalpa", "Distrito Juticalpa", Council::Comayaguela, "DST-JUT-77"),
    unit("roble-oeste", "Estaca Roble Oeste", Council::Comayaguela, "STK-ROE-77"),
];

pub fn template(id: &str) -> Option<&'static IndicatorTemplate> {
    TEMPLATES.iter().find(|template| template.id == id)
}

pub fn unit_by_id(id: &str) -> Option<&'static Unit> {
    UNITS.iter().find(|unit| unit.id == id)
}
